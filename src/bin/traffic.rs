// Standalone `traffic` switch CLI. Listing weights and setting
// a weight share the same `ClusterClient` and `weights` algebra the
// background controller uses, so the two can never disagree.

use std::sync::Arc;

use clap::Parser;
use stackset_controller::client::{ClusterClient, FakeClusterClient};
use stackset_controller::switch;

#[derive(Debug, Parser)]
#[command(name = "traffic", about = "Inspect or switch StackSet traffic weights")]
struct Args {
    #[arg(long, default_value = "default")]
    namespace: String,

    stackset: String,
    stack: Option<String>,
    weight: Option<f64>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    // TODO: wire to the real cluster client once one exists; until then this
    // binary only round-trips against what `FakeClusterClient` has been
    // seeded with, which is enough for dry-run inspection.
    let client: Arc<dyn ClusterClient> = Arc::new(FakeClusterClient::new());

    let result = match (&args.stack, args.weight) {
        (None, _) => switch::current_weights(client.as_ref(), &args.namespace, &args.stackset).await.map(|w| {
            for (name, weight) in &w {
                println!("{name}\t{weight:.2}");
            }
        }),
        (Some(stack), Some(weight)) => {
            switch::set_weight(client.as_ref(), &args.namespace, &args.stackset, stack, weight).await.map(|w| {
                for (name, updated) in &w {
                    println!("{name}\t{updated:.2}");
                }
            })
        }
        (Some(_), None) => {
            eprintln!("usage: traffic <stackset> [<stack> <weight>]");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(switch::exit_code(&e));
    }
}
