#[macro_use]
extern crate tracing;

use clap::Parser;
use eyre::Result;
use futures::StreamExt as _;
use globaldns_endpoint_controller::{
    context::Context,
    error::ReconcileError,
    reconcile::{
        Collaborators,
        Reconciler,
        Settings,
    },
    resources::{
        GlobalDNS,
        MultiClusterApp,
        DEFAULT_GLOBAL_NAMESPACE,
        DEFAULT_HOSTNAME_ANNOTATION,
        DEFAULT_PROJECT_LABEL,
    },
    watches,
};
use k8s_openapi::api::{
    core::v1::Namespace,
    networking::v1::Ingress,
};
use kube::{
    runtime::{
        controller::Action,
        watcher,
        Controller,
    },
    Api,
    CustomResourceExt as _,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
enum Args {
    /// Print the custom resource definitions
    Crds,
    /// Run the controller for this cluster
    Controller(ArgsController),
}

#[derive(Parser)]
struct ArgsController {
    #[clap(long, env = "CLUSTER_NAME", help = "Id of the cluster this controller runs in")]
    cluster_name: String,

    #[clap(
        long,
        env = "GLOBAL_NAMESPACE",
        help = "Namespace holding multi-cluster apps",
        default_value = DEFAULT_GLOBAL_NAMESPACE
    )]
    global_namespace: String,

    #[clap(
        long,
        env = "GLOBALDNS_HOSTNAME_ANNOTATION",
        help = "Ingress annotation naming the GlobalDNS fqdn",
        default_value = DEFAULT_HOSTNAME_ANNOTATION
    )]
    hostname_annotation: String,

    #[clap(
        long,
        env = "PROJECT_LABEL",
        help = "Namespace label naming the project of the namespace",
        default_value = DEFAULT_PROJECT_LABEL
    )]
    project_label: String,

    #[clap(
        long = "resync",
        env = "RESYNC_INTERVAL",
        help = "How often every GlobalDNS is reconciled even without changes",
        default_value = "5m",
        value_parser = humantime::parse_duration
    )]
    resync_interval: Duration,

    #[clap(
        long = "retry",
        env = "RETRY_INTERVAL",
        help = "Delay before retrying a failed reconcile",
        default_value = "15s",
        value_parser = humantime::parse_duration
    )]
    retry_interval: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match Args::parse() {
        Args::Crds => {
            let global_dns = serde_yaml::to_string(&GlobalDNS::crd())?;
            let multi_cluster_app = serde_yaml::to_string(&MultiClusterApp::crd())?;
            print!("{global_dns}---\n{multi_cluster_app}");
        }
        Args::Controller(args) => {
            run_controller(args).await?;
        }
    }

    Ok(())
}

async fn run_controller(
    ArgsController {
        cluster_name,
        global_namespace,
        hostname_annotation,
        project_label,
        resync_interval,
        retry_interval,
    }: ArgsController,
) -> Result<(), ReconcileError> {
    let client = kube::Client::try_default().await?;

    let settings = Settings {
        cluster_name,
        global_namespace,
        hostname_annotation,
        project_label,
    };

    let controller = Controller::new(Api::<GlobalDNS>::all(client.clone()), watcher::Config::default());
    let records = controller.store();

    let context = Arc::new(Context {
        reconciler: Reconciler::new(settings.clone(), Collaborators::kube(client.clone())),
        resync_interval,
        retry_interval,
    });

    info!(cluster = %settings.cluster_name, "Starting controller");

    let (ingress_records, ingress_settings) = (records.clone(), settings.clone());
    let (namespace_records, namespace_settings) = (records.clone(), settings.clone());
    let (app_records, app_settings) = (records, settings);

    controller
        .watches(
            Api::<Ingress>::all(client.clone()),
            watcher::Config::default(),
            move |ingress| watches::records_for_ingress(&ingress_records.state(), &ingress_settings, &ingress),
        )
        .watches(
            Api::<Namespace>::all(client.clone()),
            watcher::Config::default(),
            move |namespace| watches::records_for_namespace(&namespace_records.state(), &namespace_settings, &namespace),
        )
        .watches(
            Api::<MultiClusterApp>::all(client),
            watcher::Config::default(),
            move |app| watches::records_for_multi_cluster_app(&app_records.state(), &app_settings, &app),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((record, _)) => debug!("Reconciled: {record}"),
                Err(err) => warn!("Reconcile failed: {err}"),
            }
        })
        .await;

    info!("Controller stopped");

    Ok(())
}

async fn reconcile(resource: Arc<GlobalDNS>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    match ctx.reconciler.sync(&resource).await {
        Err(err) if err.is_conflict() => {
            // the cached object is stale, go again with the current one
            let key = kube::runtime::reflector::ObjectRef::from_obj(resource.as_ref());
            warn!("Conflict when reconciling {key}, retrying with a fresh read: {err}");
            ctx.reconciler.reconcile(&key).await?;
        }
        result => {
            result?;
        }
    }
    Ok(Action::requeue(ctx.resync_interval))
}

fn error_policy(resource: Arc<GlobalDNS>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    let key = kube::runtime::reflector::ObjectRef::from_obj(resource.as_ref());
    if err.is_conflict() {
        warn!("Conflict when reconciling {key} again: {err}");
        return Action::requeue(Duration::from_secs(1));
    }
    error!("Error reconciling {key}: {err:?}");
    Action::requeue(ctx.retry_interval)
}
