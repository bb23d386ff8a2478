//! Cluster Example: a three-member broadcast group.
//!
//! Each process registers the same functions, serves them on its own port,
//! and can broadcast a call to the whole group. Member 0 drives the demo:
//! it broadcasts `AddToCounter` to everyone (itself included, via the local
//! shortcut) and then reads every member's counter back.
//!
//! # Run
//!
//! ```bash
//! # Terminal 1, 2, 3 - start the members in any order
//! cargo run --example cluster -- 0
//! cargo run --example cluster -- 1
//! cargo run --example cluster -- 2
//! ```
//!
//! Members connect lazily with unlimited retry, so start order does not
//! matter; member 0 broadcasts once the whole group is reachable.

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use muster::{Group, PeerConfig, Registry, TokioNetworkProvider, arg};
use serde_json::json;

const MEMBERS: [&str; 3] = ["127.0.0.1:4710", "127.0.0.1:4711", "127.0.0.1:4712"];

fn build_registry() -> (Arc<Registry>, Arc<AtomicI64>) {
    let counter = Arc::new(AtomicI64::new(0));
    let registry = Registry::new();

    registry
        .register("Add", |args| {
            let a: i64 = arg(args, 0)?;
            let b: i64 = arg(args, 1)?;
            Ok(vec![json!(a + b)])
        })
        .expect("register Add");

    let c = Arc::clone(&counter);
    registry
        .register("AddToCounter", move |args| {
            let n: i64 = arg(args, 0)?;
            let total = c.fetch_add(n, Ordering::SeqCst) + n;
            println!("counter += {n} (now {total})");
            Ok(vec![])
        })
        .expect("register AddToCounter");

    let c = Arc::clone(&counter);
    registry
        .register("ReadCounter", move |_| {
            Ok(vec![json!(c.load(Ordering::SeqCst))])
        })
        .expect("register ReadCounter");

    (Arc::new(registry), counter)
}

async fn run_member(index: usize) -> Result<(), Box<dyn std::error::Error>> {
    let self_addr = MEMBERS[index];
    let members: Vec<String> = MEMBERS.iter().map(|m| m.to_string()).collect();
    let (registry, _counter) = build_registry();

    let group = Group::bind(
        TokioNetworkProvider::new(),
        self_addr,
        members,
        registry,
        PeerConfig::default(),
    )
    .await?;

    println!("member {index} serving on {self_addr}");

    if index == 0 {
        // Give the other terminals a moment, then drive the demo. The
        // unlimited retry budget would cover a slow start anyway.
        tokio::time::sleep(Duration::from_secs(2)).await;

        println!("\nbroadcasting Add(10, 21) to {} members", group.len());
        let results = group.call("Add", vec![json!(10), json!(21)]).await?;
        for (i, outputs) in results.iter().enumerate() {
            println!("  member {i} ({}) -> {outputs:?}", group.members()[i]);
        }

        println!("\nbroadcasting AddToCounter(3)");
        group.call("AddToCounter", vec![json!(3)]).await?;

        println!("\nreading counters back");
        let results = group.call("ReadCounter", vec![]).await?;
        let total: i64 = results
            .iter()
            .filter_map(|outputs| outputs.first())
            .filter_map(|v| v.as_i64())
            .sum();
        for (i, outputs) in results.iter().enumerate() {
            println!("  member {i} counter = {outputs:?}");
        }
        println!("group total: {total}");

        println!("\nfire-and-forget: cast AddToCounter(1)");
        group.cast("AddToCounter", vec![json!(1)]);
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    // Keep serving so the other members can keep calling us.
    println!("\nmember {index} idle, press Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let index = args.get(1).and_then(|s| s.parse::<usize>().ok());

    match index {
        Some(index) if index < MEMBERS.len() => {
            if let Err(e) = run_member(index).await {
                eprintln!("member error: {e}");
                std::process::exit(1);
            }
        }
        _ => {
            println!("Cluster Example: broadcast named calls to a member group\n");
            println!("Usage:");
            for i in 0..MEMBERS.len() {
                println!("  cargo run --example cluster -- {i}   # serve {}", MEMBERS[i]);
            }
            println!("\nStart each member in its own terminal, in any order.");
        }
    }
}
