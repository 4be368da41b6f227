//! One-off discovery scan.

use std::collections::BTreeMap;
use std::time::Duration;

use oink_core::{Address, PayloadKind};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::node::Node;

/// Scan the local /24, then collect replies for one scan interval.
pub fn scan(config: &ClientConfig, first: Option<u8>, last: Option<u8>) -> ClientResult<()> {
    let first = first.unwrap_or(config.discovery.first_host);
    let last = last.unwrap_or(config.discovery.last_host);
    if first > last {
        return Err(ClientError::config(format!(
            "--first {} is after --last {}",
            first, last
        )));
    }

    let mut node = Node::from_config(config)?;
    node.start_listening();
    if !node.is_listening() {
        return Err(ClientError::NotListening(node.address().to_string()));
    }

    let sent = node.scan(first..=last);
    println!(
        "Scanning {} hosts from {}, waiting {}s for replies",
        sent,
        node.address(),
        config.discovery.scan_interval_secs
    );

    node.dispatcher()
        .block_on(tokio::time::sleep(config.discovery.scan_interval()));

    let mut peers: BTreeMap<Address, String> = BTreeMap::new();
    for inbound in node.poll_inbound() {
        if inbound.kind != PayloadKind::Message && inbound.payload.from != *node.address() {
            let nickname = inbound.payload.nickname.unwrap_or_else(|| "?".to_string());
            peers.insert(inbound.payload.from, nickname);
        }
    }

    if peers.is_empty() {
        println!("No peers found.");
    }
    for (address, nickname) in &peers {
        println!("{:<24} {}", address.to_string(), nickname);
    }

    node.shutdown(Duration::from_secs(1));
    Ok(())
}
