use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::Settings;
use crate::paths;
use crate::ui;

pub fn run(ctx: &Context, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    ui::header("Configuration");

    let file = paths::settings_file()?;
    let settings = Settings::load_from(&file)?;

    println!();
    ui::kv("Settings file", &paths::display_path(&file));
    if !file.exists() {
        ui::dim("  Not found, using defaults");
    }
    ui::kv(
        "State directory",
        &paths::display_path(&settings.state_dir(ctx.state_dir.as_deref())?),
    );

    ui::section("Settings");
    let rendered = toml::to_string_pretty(&settings)?;
    for line in rendered.lines().filter(|l| !l.trim().is_empty()) {
        println!("  {line}");
    }

    println!();
    ui::dim(&format!(
        "Override directories with {} and {}.",
        paths::ENV_CONFIG_DIR,
        paths::ENV_STATE_DIR
    ));
    Ok(())
}
