use std::process::ExitCode;

use city_weather_service::cities::City;
use city_weather_service::config::{self, AppConfig};
use city_weather_service::ingest::{ReplaySource, YandexWeatherClient};
use city_weather_service::logging::{self, Stage};
use city_weather_service::pipeline::Pipeline;
use city_weather_service::report;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    ) {
        eprintln!("Logging setup failed: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&config).await {
        Ok(favorable) => {
            println!("{}", report::favorable_line(&favorable));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(stage = %Stage::System, "run failed: {}", e);
            eprintln!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &AppConfig) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let cities: Vec<City> = config.city_list();
    let names = config.city_names();
    let settings = config.pipeline_settings();

    tracing::info!(stage = %Stage::System, cities = names.len(), "starting forecast ranking");

    let favorable = match &config.fetch.replay_dir {
        Some(dir) => {
            Pipeline::new(ReplaySource::new(dir), settings)
                .run(&names)
                .await?
        }
        None => {
            Pipeline::new(YandexWeatherClient::new(&cities)?, settings)
                .run(&names)
                .await?
        }
    };
    Ok(favorable)
}
