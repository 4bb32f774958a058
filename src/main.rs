use log::debug;
use pipesh::shell::Shell;
use pipesh::utils::config::Config;
use pipesh::utils::log::init_logger;
use pipesh::utils::theme::load_theme;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new()?;
    init_logger(&config)?;
    debug!("configuration loaded from {}", config.config_dir.display());
    let theme = load_theme(&config.theme);

    let mut shell = Shell::new(&config, theme)?;
    shell.run()
}
