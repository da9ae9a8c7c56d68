use std::sync::Arc;

use trellis::prelude::*;

fn main() {
    // Host side: one registry, sealed once every suite is in.
    let registry = PluginRegistry::new();
    register_standard(&registry).expect("standard suite registers");
    registry.seal().expect("seal after registration");

    println!("binding table:\n{registry}");

    // Translator side: a static call to lang.Math.abs(I)I shows up.
    let method = Arc::new(MethodRef::new(
        TypeName::new(trellis::plugins::MATH_TYPE),
        "abs",
        "(I)I",
        true,
    ));
    let plugin = registry
        .lookup(&method)
        .expect("lookup")
        .expect("abs is bound by the standard suite");

    let mut builder = FragmentBuilder::for_invocation(
        Arc::clone(&method),
        InvokeKind::Static,
        BuilderConfig::new(),
    )
    .expect("fragment for a one-arg static call");
    assert!(builder.expand(plugin.as_ref()).expect("expansion"));
    let graph = builder.finish().expect("finished fragment");

    println!("expanded {method} into {} nodes:", graph.node_count());
    for id in graph.node_ids() {
        println!("  {:?}", graph.node(id).op);
    }
}
