use starmatch::core::report::{render_json, render_text};
use starmatch::utils::{logger, validation::Validate};
use starmatch::{CliConfig, SkyServerClient, StarMatchEngine, StarMatchError, StarMatchPipeline};

fn fail(e: &StarMatchError) -> ! {
    tracing::error!(
        "❌ starmatch failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code());
}

#[tokio::main]
async fn main() {
    let cli = match CliConfig::parse_args(std::env::args_os()) {
        Ok(Some(cli)) => cli,
        Ok(None) => return,
        Err(e) => {
            // 參數數量錯誤：印出用法並以 1 結束
            println!("{}", starmatch::config::USAGE);
            if let StarMatchError::UsageError { detail } = &e {
                eprintln!("{}", detail);
            }
            std::process::exit(e.exit_code());
        }
    };

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    let catalog = if config.catalog.enabled {
        match SkyServerClient::new(config.catalog.clone()) {
            Ok(client) => Some(client),
            Err(e) => fail(&e),
        }
    } else {
        None
    };

    let pipeline = StarMatchPipeline::new(&cli.filename, config, catalog);
    let engine = StarMatchEngine::new(pipeline);

    match engine.run().await {
        Ok(report) => {
            if cli.json {
                match render_json(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => fail(&e),
                }
            } else {
                print!("{}", render_text(&report));
            }
        }
        Err(e) => fail(&e),
    }
}
