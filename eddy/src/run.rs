use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Args, builder::BoolishValueParser};
use eddy_data_lake::{DeltaTableWriter, S3StorageOptions};
use eddy_ingestor_core::{ConnectOptions, ConnectionSupervisor, IngestLoop, IngestOptions};
use eddy_kafka::{KafkaConnector, KafkaOptions};
use snafu::{ResultExt, ensure};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{DataLakeSnafu, IngestSnafu, InvalidArgumentSnafu, Result};

#[derive(Args)]
pub struct RunArgs {
    /// Kafka bootstrap servers.
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS", default_value = "kafka:29092")]
    bootstrap_servers: String,
    /// Topic to consume.
    #[arg(long, env = "KAFKA_TOPIC", default_value = "analytics-events")]
    topic: String,
    /// Consumer group id. Committed offsets are tracked per group.
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = "delta-writer-consumer")]
    group_id: String,
    /// Extra librdkafka setting in `key=value` form. Can be repeated.
    #[arg(
        long = "kafka-setting",
        env = "KAFKA_SETTINGS",
        value_delimiter = ',',
        value_parser = parse_kafka_setting
    )]
    kafka_settings: Vec<(String, String)>,

    /// Location of the Delta table.
    #[arg(
        long,
        env = "DELTA_TABLE_PATH",
        default_value = "s3://analytics/delta/analytics-events"
    )]
    table_path: String,

    /// Buffered events that trigger a flush.
    #[arg(long, env = "BATCH_SIZE", default_value_t = 100)]
    batch_size: usize,
    /// Seconds since the last flush that trigger a flush.
    #[arg(long, env = "BATCH_TIMEOUT_SECONDS", default_value_t = 10)]
    batch_timeout_seconds: u64,
    /// Longest wait for a single message, bounds shutdown latency.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Broker connection attempts before giving up.
    #[arg(long, env = "CONNECT_MAX_ATTEMPTS", default_value_t = 30)]
    connect_max_attempts: u32,
    #[arg(long, env = "CONNECT_RETRY_SECONDS", default_value_t = 5)]
    connect_retry_seconds: u64,
    /// Append attempts per batch before giving up.
    #[arg(long, env = "WRITE_MAX_ATTEMPTS", default_value_t = 5)]
    write_max_attempts: u32,
    #[arg(long, env = "WRITE_RETRY_SECONDS", default_value_t = 3)]
    write_retry_seconds: u64,

    /// S3 endpoint. Empty to use AWS.
    #[arg(long, env = "AWS_ENDPOINT_URL", default_value = "http://minio:9000")]
    aws_endpoint_url: String,
    #[arg(long, env = "AWS_ACCESS_KEY_ID", default_value = "minioadmin")]
    aws_access_key_id: String,
    #[arg(
        long,
        env = "AWS_SECRET_ACCESS_KEY",
        default_value = "minioadmin",
        hide_default_value = true,
        hide_env_values = true
    )]
    aws_secret_access_key: String,
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    aws_region: String,
    #[arg(
        long,
        env = "AWS_ALLOW_HTTP",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    aws_allow_http: bool,
    /// Commit without a locking provider. Only safe with a single writer.
    #[arg(
        long,
        env = "AWS_S3_ALLOW_UNSAFE_RENAME",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    aws_s3_allow_unsafe_rename: bool,
}

/// Validated settings for each component.
#[derive(Debug)]
pub struct RunConfig {
    pub kafka: KafkaOptions,
    pub connect: ConnectOptions,
    pub ingest: IngestOptions,
    pub table_path: String,
    pub storage: S3StorageOptions,
}

impl RunArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let config = self.into_config()?;

        let _guard = match eddy_observability::init_observability(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        ) {
            Ok(guard) => Some(guard),
            Err(err) => {
                eprintln!("Failed to initialize observability: {err}");
                None
            }
        };

        info!(
            kafka = ?config.kafka,
            connect = ?config.connect,
            ingest = ?config.ingest,
            table_path = %config.table_path,
            storage = ?config.storage,
            "Starting eddy"
        );

        let sink = DeltaTableWriter::new(&config.table_path, config.storage.to_storage_options())
            .context(DataLakeSnafu {})?;
        let connector = KafkaConnector::new(config.kafka);
        let supervisor = ConnectionSupervisor::new(Arc::new(connector), config.connect);

        IngestLoop::new(supervisor, Arc::new(sink), config.ingest)
            .run(ct)
            .await
            .context(IngestSnafu {})?;

        info!("eddy stopped");
        Ok(())
    }

    pub fn into_config(self) -> Result<RunConfig> {
        ensure_positive("batch-size", self.batch_size as u64)?;
        ensure_positive("batch-timeout-seconds", self.batch_timeout_seconds)?;
        ensure_positive("poll-interval-ms", self.poll_interval_ms)?;
        ensure_positive("connect-max-attempts", self.connect_max_attempts as u64)?;
        ensure_positive("write-max-attempts", self.write_max_attempts as u64)?;
        ensure_not_blank("bootstrap-servers", &self.bootstrap_servers)?;
        ensure_not_blank("topic", &self.topic)?;
        ensure_not_blank("group-id", &self.group_id)?;
        ensure_not_blank("table-path", &self.table_path)?;

        let endpoint_url = Some(self.aws_endpoint_url).filter(|url| !url.trim().is_empty());

        Ok(RunConfig {
            kafka: KafkaOptions {
                bootstrap_servers: self.bootstrap_servers,
                topic: self.topic,
                group_id: self.group_id,
                settings: self.kafka_settings,
                ..Default::default()
            },
            connect: ConnectOptions {
                max_attempts: self.connect_max_attempts,
                retry_interval: Duration::from_secs(self.connect_retry_seconds),
            },
            ingest: IngestOptions {
                batch_size: self.batch_size,
                batch_age: Duration::from_secs(self.batch_timeout_seconds),
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                write_max_attempts: self.write_max_attempts,
                write_retry_interval: Duration::from_secs(self.write_retry_seconds),
            },
            table_path: self.table_path,
            storage: S3StorageOptions {
                endpoint_url,
                access_key_id: self.aws_access_key_id,
                secret_access_key: self.aws_secret_access_key,
                region: self.aws_region,
                allow_http: self.aws_allow_http,
                allow_unsafe_rename: self.aws_s3_allow_unsafe_rename,
            },
        })
    }
}

fn parse_kafka_setting(setting: &str) -> Result<(String, String), String> {
    eddy_kafka::parse_setting(setting).map_err(|err| err.to_string())
}

fn ensure_positive(name: &'static str, value: u64) -> Result<()> {
    ensure!(
        value > 0,
        InvalidArgumentSnafu {
            name,
            message: "must be at least 1",
        }
    );
    Ok(())
}

fn ensure_not_blank(name: &'static str, value: &str) -> Result<()> {
    ensure!(
        !value.trim().is_empty(),
        InvalidArgumentSnafu {
            name,
            message: "must not be empty",
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::error::CliError;

    #[derive(Parser)]
    struct TestCli {
        #[clap(flatten)]
        args: RunArgs,
    }

    fn parse(args: &[&str]) -> RunArgs {
        let argv = std::iter::once("eddy").chain(args.iter().copied());
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_flags_build_component_options() {
        let config = parse(&[
            "--bootstrap-servers",
            "localhost:9092",
            "--topic",
            "clicks",
            "--batch-size",
            "500",
            "--batch-timeout-seconds",
            "30",
            "--kafka-setting",
            "client.id=eddy",
            "--kafka-setting",
            "fetch.min.bytes=1",
            "--aws-endpoint-url",
            "",
            "--aws-allow-http",
            "false",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.kafka.bootstrap_servers, "localhost:9092");
        assert_eq!(config.kafka.topic, "clicks");
        assert_eq!(
            config.kafka.settings,
            vec![
                ("client.id".to_string(), "eddy".to_string()),
                ("fetch.min.bytes".to_string(), "1".to_string()),
            ]
        );
        assert_eq!(config.ingest.batch_size, 500);
        assert_eq!(config.ingest.batch_age, Duration::from_secs(30));
        assert_eq!(config.storage.endpoint_url, None);
        assert!(!config.storage.allow_http);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let Err(err) = parse(&["--batch-size", "0"]).into_config() else {
            panic!("zero batch size should be rejected");
        };

        assert!(matches!(
            err,
            CliError::InvalidArgument {
                name: "batch-size",
                ..
            }
        ));
        assert_eq!(err.kind(), eddy_observability::ErrorKind::Configuration);
    }

    #[test]
    fn test_blank_table_path_rejected() {
        let Err(err) = parse(&["--table-path", " "]).into_config() else {
            panic!("blank table path should be rejected");
        };

        assert!(matches!(
            err,
            CliError::InvalidArgument {
                name: "table-path",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_kafka_setting_rejected() {
        let argv = ["eddy", "--kafka-setting", "client.id"];
        assert!(TestCli::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_config_debug_redacts_secret() {
        let config = parse(&["--aws-secret-access-key", "hunter2"])
            .into_config()
            .unwrap();

        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
