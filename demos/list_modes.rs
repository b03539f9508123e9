use screenres::{Form, ModeRegistry, PlatformBackend};

fn main() {
    let backend = PlatformBackend::new().expect("Failed to open the display subsystem");
    let registry = ModeRegistry::new(backend).expect("Failed to enumerate display modes");

    println!("Initial mode: {}", registry.render_initial(Form::Long));
    println!();

    for mode in registry.modes() {
        println!("{}", mode.render(Form::Long));
        println!("  Flags: {:#x}", mode.flags.raw());
    }

    println!();
    println!("Distinct resolutions: {}", registry.list_all(Form::Short).join(", "));
}
