use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static CLAPPER: Emoji<'_, '_> = Emoji("🎬 ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", CLAPPER, style(label).bold().cyan(), msg);
}

pub fn print_banner() {
    let lines: &[&str] = &[
        "               _ _           _   ",
        "  _ __ ___  ___| | |__   ___ | |_ ",
        " | '__/ _ \\/ _ \\ | '_ \\ / _ \\| __|",
        " | | |  __/  __/ | |_) | (_) | |_ ",
        " |_|  \\___|\\___|_|_.__/ \\___/ \\__|",
    ];
    println!();
    for line in lines {
        println!("{}", style(*line).cyan());
    }
    println!(
        "{}\n",
        style(" Automated short-form video creation.").dim()
    );
}
