use cab_viewer::Variant;

fn main() -> anyhow::Result<()> {
    let variant = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<Variant>()?,
        None => Variant::default(),
    };
    cab_viewer::flow::run(variant)
}
