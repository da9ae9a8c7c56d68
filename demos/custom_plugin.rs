//! A host registering its own substitutions: a pure two-node lowering
//! and a receiver method that must null-check before reading.

use std::sync::Arc;

use trellis::prelude::*;

const CHECKSUM_TYPE: &str = "demo.Checksum";
const BUFFER_TYPE: &str = "demo.Buffer";

fn register_demo_plugins(registry: &PluginRegistry) -> Result<(), RegistrationError> {
    let checksum = registry.register(CHECKSUM_TYPE);
    checksum.register(Binding::new(
        "mix",
        Signature::of([
            ParamSpec::Kind(ValueKind::I32),
            ParamSpec::Kind(ValueKind::I32),
        ])?,
        FnPlugin::arc(|b, _method, _receiver, args| {
            let xor = b
                .graph_mut()
                .binary(BinaryOp::Xor, ValueKind::I32, args[0], args[1]);
            let result = b
                .graph_mut()
                .unary(UnaryOp::ReverseBytes, ValueKind::I32, xor);
            b.add_push(ValueKind::I32, result)?;
            Ok(true)
        }),
    ))?;

    let buffer = registry.register(BUFFER_TYPE);
    buffer.register(Binding::new(
        "size",
        Signature::of([ParamSpec::Receiver])?,
        FnPlugin::arc(|b, _method, receiver, _args| {
            let Some(receiver) = receiver else {
                return Ok(false);
            };
            let buffer = receiver.get(b)?;
            let size = b.graph_mut().array_length(buffer);
            b.add_push(ValueKind::I32, size)?;
            Ok(true)
        }),
    ))?;
    Ok(())
}

fn expand(registry: &PluginRegistry, method: &Arc<MethodRef>, mode: ExceptionMode) -> Graph {
    let plugin = registry
        .lookup(method)
        .expect("lookup")
        .expect("demo plugin is bound");
    let kind = if method.is_static() {
        InvokeKind::Static
    } else {
        InvokeKind::Virtual
    };
    let config = BuilderConfig::new().with_exception_mode(mode);
    let mut builder =
        FragmentBuilder::for_invocation(Arc::clone(method), kind, config).expect("fragment");
    assert!(builder.expand(plugin.as_ref()).expect("expansion"));
    builder.finish().expect("finished fragment")
}

fn print_graph(label: &str, graph: &Graph) {
    println!("{label} ({} nodes):", graph.node_count());
    for id in graph.node_ids() {
        println!("  {:?}", graph.node(id).op);
    }
}

fn main() {
    let registry = PluginRegistry::new();
    register_demo_plugins(&registry).expect("demo plugins register");
    registry.seal().expect("seal after registration");

    let mix = Arc::new(MethodRef::new(
        TypeName::new(CHECKSUM_TYPE),
        "mix",
        "(II)I",
        true,
    ));
    print_graph("mix", &expand(&registry, &mix, ExceptionMode::Guard));

    // The receiver null check changes shape with the exception mode:
    // a guard in speculative mode, a compare-and-raise in explicit mode.
    let size = Arc::new(MethodRef::new(
        TypeName::new(BUFFER_TYPE),
        "size",
        "()I",
        false,
    ));
    print_graph(
        "size, guard mode",
        &expand(&registry, &size, ExceptionMode::Guard),
    );
    print_graph(
        "size, explicit mode",
        &expand(&registry, &size, ExceptionMode::Explicit),
    );
}
