//! Binary entry point for the `ec2-volumes` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use ec2_volumes::{
    BackendId, CinderClient, CreateVolumeRequest, DescribeVolumesRequest, DetachVolumeRequest,
    Ec2Id, Filter, GatewayConfig, JsonMappingStore, NovaClient, OpenStackSession, VolumeApiError,
    VolumeService,
};

mod cli;

use cli::{
    AttachVolumeCommand, Cli, CreateVolumeCommand, DescribeVolumesCommand, DetachVolumeCommand,
    UpdateDeleteOnTerminationCommand, VolumeIdArgs,
};

type Service = VolumeService<CinderClient, NovaClient, JsonMappingStore>;

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(String),
    #[error("failed to initialise backend client: {0}")]
    Backend(String),
    #[error(transparent)]
    Api(#[from] VolumeApiError),
    #[error("failed to write output: {0}")]
    Output(String),
}

impl CliError {
    const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "ConfigurationError",
            Self::Api(err) => err.code(),
            Self::Backend(_) | Self::Output(_) => "InternalError",
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let service = build_service()?;
    match cli {
        Cli::CreateVolume(command) => {
            let volume = service.create_volume(create_request(command)).await?;
            emit(&volume)
        }
        Cli::AttachVolume(AttachVolumeCommand {
            volume_id,
            instance_id,
            device,
        }) => {
            let attachment = service
                .attach_volume(
                    &BackendId::new(volume_id),
                    &Ec2Id::new(instance_id),
                    &device,
                )
                .await?;
            emit(&attachment)
        }
        Cli::DetachVolume(command) => {
            let attachment = service.detach_volume(&detach_request(command)).await?;
            emit(&attachment)
        }
        Cli::DeleteVolume(VolumeIdArgs { volume_id }) => {
            let deleted = service.delete_volume(&BackendId::new(volume_id)).await?;
            emit(&json!({ "return": deleted }))
        }
        Cli::DescribeVolumes(command) => {
            let volumes = service.describe_volumes(&describe_request(command)?).await?;
            emit(&json!({ "volumeSet": volumes }))
        }
        Cli::ShowDeleteOnTermination(VolumeIdArgs { volume_id }) => {
            let flag = service
                .show_delete_on_termination(&BackendId::new(volume_id))
                .await?;
            emit(&json!({ "volume": flag }))
        }
        Cli::UpdateDeleteOnTermination(UpdateDeleteOnTerminationCommand {
            volume_id,
            delete_on_termination,
        }) => {
            let flag = service
                .update_delete_on_termination(&BackendId::new(volume_id), delete_on_termination)
                .await?;
            emit(&json!({ "volume": flag }))
        }
        Cli::Reconcile => {
            let summary = service.reconciler().sweep().await?;
            emit(&summary)
        }
    }
}

fn build_service() -> Result<Service, CliError> {
    let config =
        GatewayConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let session = OpenStackSession::new(config.auth_token.as_str(), config.http_timeout())
        .map_err(|err| CliError::Backend(err.to_string()))?;
    let storage = CinderClient::new(session.clone(), config.volume_endpoint.as_str());
    let compute = NovaClient::new(session, config.compute_endpoint.as_str());
    let mapping = JsonMappingStore::new(config.mapping_path());
    Ok(VolumeService::new(storage, compute, mapping)
        .with_default_zone(config.default_availability_zone))
}

fn create_request(command: CreateVolumeCommand) -> CreateVolumeRequest {
    CreateVolumeRequest {
        availability_zone: command.availability_zone,
        size: command.size,
        snapshot_id: command.snapshot_id.map(Ec2Id::new),
        volume_type: command.volume_type,
        iops: command.iops,
        encrypted: command.encrypted.then_some(true),
        kms_key_id: command.kms_key_id,
    }
}

fn detach_request(command: DetachVolumeCommand) -> DetachVolumeRequest {
    DetachVolumeRequest {
        volume_id: BackendId::new(command.volume_id),
        instance_id: command.instance_id.map(Ec2Id::new),
        device: command.device,
        force: command.force,
    }
}

fn describe_request(command: DescribeVolumesCommand) -> Result<DescribeVolumesRequest, CliError> {
    let filters = command
        .filters
        .iter()
        .map(|raw| parse_filter(raw))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DescribeVolumesRequest {
        volume_ids: command.volume_ids.into_iter().map(BackendId::new).collect(),
        filters,
    })
}

/// Parses `name=value[,value...]`.
fn parse_filter(raw: &str) -> Result<Filter, VolumeApiError> {
    let Some((name, values)) = raw.split_once('=') else {
        return Err(VolumeApiError::InvalidParameterValue {
            name: String::from("Filter"),
            reason: format!("expected NAME=VALUES, got '{raw}'"),
        });
    };
    Ok(Filter::new(
        name.trim(),
        values
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty()),
    ))
}

fn emit(value: &impl Serialize) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(io::stdout(), "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{}: {err}", err.code()).ok();
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("status=in-use", "status", vec!["in-use"])]
    #[case("attachment.device=/dev/vd*, /dev/sd*", "attachment.device", vec!["/dev/vd*", "/dev/sd*"])]
    #[case("volume-id=", "volume-id", vec![])]
    fn filters_parse(#[case] raw: &str, #[case] name: &str, #[case] values: Vec<&str>) {
        let filter = parse_filter(raw).unwrap_or_else(|err| panic!("parse: {err}"));
        assert_eq!(filter.name, name);
        assert_eq!(filter.values, values);
    }

    #[test]
    fn filter_without_separator_is_rejected() {
        let err = parse_filter("status").expect_err("missing '='");
        assert_eq!(err.code(), "InvalidParameterValue");
    }

    #[test]
    fn encrypted_flag_is_only_forwarded_when_set() {
        let command = CreateVolumeCommand {
            availability_zone: None,
            size: Some(1),
            snapshot_id: Some(String::from("snap-1")),
            volume_type: None,
            iops: None,
            encrypted: false,
            kms_key_id: None,
        };
        let request = create_request(command);
        assert_eq!(request.encrypted, None);
        assert_eq!(request.snapshot_id, Some(Ec2Id::from("snap-1")));
    }

    #[test]
    fn write_error_prefixes_the_ec2_code() {
        let mut buf = Vec::new();
        let err = CliError::Api(VolumeApiError::IncorrectState {
            reason: String::from("Volume bv-1 is not attached to anything"),
        });
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert_eq!(
            rendered,
            "IncorrectState: Volume bv-1 is not attached to anything\n"
        );
    }
}
