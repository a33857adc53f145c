//! Tables printed at the end of a run.

use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use salekit_deploy::{ContractKind, DeploymentOutcome, NetworkId, Registry, SecondaryEntry};

/// One row per contract: status, address and whatever is still pending.
pub fn outcomes_table(outcomes: &[DeploymentOutcome]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Contract", "Network", "Status", "Address", "Reused", "Details",
    ]);

    for outcome in outcomes {
        let (color, reused, details) = match outcome {
            DeploymentOutcome::Skipped { .. } => {
                (Color::DarkGrey, String::new(), "network not supported".to_string())
            }
            DeploymentOutcome::Completed { reused, steps, .. } => (
                Color::Green,
                reused.to_string(),
                format!("{} setter call(s) confirmed", steps),
            ),
            DeploymentOutcome::PartiallyConfigured {
                reused,
                failure,
                pending,
                ..
            } => {
                let pending = pending
                    .iter()
                    .map(|step| format!("pending: {}", step))
                    .collect::<Vec<_>>()
                    .join("\n");
                (
                    Color::Red,
                    reused.to_string(),
                    format!("failed: {}\n{}", failure, pending),
                )
            }
        };

        table.add_row(vec![
            Cell::new(outcome.contract()),
            Cell::new(outcome.network()),
            Cell::new(outcome.status()).fg(color),
            Cell::new(
                outcome
                    .address()
                    .map(|address| address.to_string())
                    .unwrap_or_default(),
            ),
            Cell::new(reused),
            Cell::new(details),
        ]);
    }

    table
}

/// What a run on `network` would deploy, without touching the chain.
pub fn plan_table(
    registry: &Registry,
    network: NetworkId,
    contracts: &[ContractKind],
) -> anyhow::Result<Table> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Contract", "Constructor arguments", "Post-deploy calls"]);

    let mut contracts = contracts.to_vec();
    contracts.sort();
    contracts.dedup();

    for contract in contracts {
        let Some(record) = registry.lookup(contract, network) else {
            table.add_row(vec![
                Cell::new(contract),
                Cell::new("skipped: network not supported").fg(Color::DarkGrey),
                Cell::new(""),
            ]);
            continue;
        };

        let args = contract
            .constructor_args(network, record)?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        let mut calls: Vec<String> = record
            .post_deploy_thresholds(contract)
            .iter()
            .map(|(threshold, value)| format!("{} = {}", threshold, value))
            .collect();
        if contract.has_entry_setters() {
            calls.extend(record.secondary_entries.iter().map(entry_line));
        }

        table.add_row(vec![
            Cell::new(contract),
            Cell::new(args),
            Cell::new(calls.join("\n")),
        ]);
    }

    Ok(table)
}

fn entry_line(entry: &SecondaryEntry) -> String {
    format!("{} via {}", entry.asset, entry.feed)
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::Address;

    use super::*;

    #[test]
    fn test_plan_lists_every_contract() {
        let registry = Registry::bundled().unwrap();
        let table = plan_table(
            &registry,
            NetworkId(222),
            &[ContractKind::Presale, ContractKind::PrivateSaleSel],
        )
        .unwrap();

        let rendered = table.to_string();
        assert!(rendered.contains("Presale"));
        assert!(rendered.contains("skipped"));
        assert!(rendered.contains("PrivateSaleSEL"));
    }

    #[test]
    fn test_plan_shows_thresholds_and_entries() {
        let registry = Registry::bundled().unwrap();
        let rendered = plan_table(&registry, NetworkId(97), &[ContractKind::Presale])
            .unwrap()
            .to_string();

        assert!(rendered.contains("min_investment = 1"));
        assert!(rendered.contains("1635686100"));
    }

    #[test]
    fn test_outcomes_table_rows() {
        let outcomes = vec![
            DeploymentOutcome::Skipped {
                contract: ContractKind::SelendraSale,
                network: NetworkId(222),
            },
            DeploymentOutcome::Completed {
                contract: ContractKind::PrivateSaleSel,
                network: NetworkId(222),
                address: Address::with_last_byte(1),
                reused: true,
                steps: 0,
            },
        ];

        let rendered = outcomes_table(&outcomes).to_string();
        assert!(rendered.contains("skipped"));
        assert!(rendered.contains("completed"));
        assert!(rendered.contains(&Address::with_last_byte(1).to_string()));
    }
}
