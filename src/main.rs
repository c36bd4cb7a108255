mod app;

use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notchkit=info")),
        )
        .init();
    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "notchkit",
        native_options,
        Box::new(|cc| Ok(Box::new(app::BlocksApp::new(cc)))),
    )
}
