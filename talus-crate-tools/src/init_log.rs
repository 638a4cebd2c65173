use std::io::Write;

/// 初始化全局日志
///
/// 默认级别为 Info，可以通过 `RUST_LOG` 环境变量覆盖。
pub fn init_log() {
    env_logger::Builder::new()
        .format(|buf, record| {
            let level_style = match record.level() {
                log::Level::Info => buf
                    .default_level_style(log::Level::Info)
                    .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
                log::Level::Warn => buf
                    .default_level_style(log::Level::Warn)
                    .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
                log::Level::Error => buf
                    .default_level_style(log::Level::Error)
                    .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
                _ => buf.default_level_style(record.level()),
            };
            let dim_style =
                buf.default_level_style(record.level()).fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(
                    110, 110, 110,
                ))));

            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let module = record.module_path().unwrap_or("<unknown>");

            writeln!(
                buf,
                "{level_style}[{time}] {}{level_style:#} {dim_style}[{module}]{dim_style:#} {}",
                record.level(),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
