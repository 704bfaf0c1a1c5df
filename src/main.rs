use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use wiring::logging::{init_logging, OperationTimer};
use wiring::{Injector, Instance, WiringConfig};

/// wiring - 读取 TOML 配置并按名称解析依赖
#[derive(Parser, Debug)]
#[command(name = "wiring")]
#[command(about = "Resolve named values from a TOML provider configuration")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true, default_value = "wiring.toml")]
    config: PathBuf,

    /// 提高日志详细程度（可重复）
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// 解析一个或多个名称（支持 `a.b.c` 属性路径）
    Get {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// 列出所有提供者
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = WiringConfig::load(&cli.config)
        .with_context(|| format!("无法加载配置文件 {}", cli.config.display()))?;
    init_logging(&config.logging_config()?.with_verbosity(cli.verbose))?;

    let injector = config.injector_builder()?.build()?;

    match cli.command {
        Command::Get { names } => {
            for name in &names {
                let timer = OperationTimer::new(format!("get {name}"));
                let instance = injector.get(name)?;
                timer.finish();

                if names.len() > 1 {
                    println!("{name} = {}", render(&instance)?);
                } else {
                    println!("{}", render(&instance)?);
                }
            }
        }
        Command::List => list(&injector),
    }

    Ok(())
}

fn list(injector: &Injector) {
    println!("{:<24} self", injector.self_name());
    for name in injector.provider_names() {
        if let Some(kind) = injector.provider_kind(name) {
            println!("{name:<24} {kind}");
        }
    }
}

fn render(instance: &Instance) -> Result<String> {
    match instance.as_json() {
        Some(json) => Ok(serde_json::to_string_pretty(json)?),
        None => Ok(format!("<{}>", instance.type_name())),
    }
}
