// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use bid_engine_rs::{
    ActorId, Decision, Engine, EngineConfig, Identity, ItemId, ItemKind, ItemRef, ItemStatus,
    NewItem, NewOffer, OfferError, OfferId, OfferRevision, OfferStatus, ReplacementPolicy,
};
use clap::{Parser, ValueEnum};
use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::{Level, debug, error};

/// Bid Engine - Replay marketplace command CSV files
///
/// Reads item and offer commands from a CSV file and writes the resulting
/// offers (or items) to stdout.
#[derive(Parser, Debug)]
#[command(name = "bid-engine-rs")]
#[command(about = "Replays offer lifecycle commands from a CSV file", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: op,actor,kind,target,amount,details,delivery
    /// Example: cargo run -- commands.csv > offers.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// How accepting a product offer treats earlier accepted offers
    #[arg(long, value_enum, default_value_t = ReplacementPolicy::SingleWinner)]
    replacement_policy: ReplacementPolicy,

    /// Table written to stdout
    #[arg(long, value_enum, default_value_t = Report::Offers)]
    report: Report,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    Offers,
    Items,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            error!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let config = EngineConfig {
        replacement_policy: args.replacement_policy,
    };
    let engine = match process_commands(BufReader::new(file), config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Error processing commands: {}", e);
            process::exit(1);
        }
    };

    let written = match args.report {
        Report::Offers => write_offers(&engine, std::io::stdout()),
        Report::Items => write_items(&engine, std::io::stdout()),
    };
    if let Err(e) = written {
        error!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, actor, kind, target, amount, details, delivery`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    actor: u64,
    #[serde(default)]
    kind: Option<String>,
    #[serde(deserialize_with = "csv::invalid_option")]
    target: Option<u64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<u64>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    delivery: Option<String>,
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    CreateJob { owner: ActorId, item: NewItem },
    CreateProduct { owner: ActorId, item: NewItem },
    Submit { provider: Identity, offer: NewOffer },
    Resolve { owner: Identity, offer: OfferId, decision: Decision },
    Revive { provider: Identity, offer: OfferId, revision: OfferRevision },
    Complete { owner: Identity, item: ItemRef },
    Cancel { owner: Identity, item: ItemRef },
}

fn parse_kind(kind: Option<&str>) -> Option<ItemKind> {
    match kind?.to_lowercase().as_str() {
        "job" => Some(ItemKind::Job),
        "product" => Some(ItemKind::Product),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl CsvRecord {
    /// Converts CSV record to a command.
    ///
    /// Returns `None` for unknown operations or missing required fields.
    fn into_command(self) -> Option<Command> {
        let item_ref = |target: Option<u64>, kind: Option<&str>| {
            Some(ItemRef {
                kind: parse_kind(kind)?,
                id: ItemId(target?),
            })
        };
        let kind = self.kind.as_deref();

        match self.op.to_lowercase().as_str() {
            "job" => Some(Command::CreateJob {
                owner: ActorId(self.actor),
                item: NewItem::titled(self.details.unwrap_or_default()),
            }),
            "product" => Some(Command::CreateProduct {
                owner: ActorId(self.actor),
                item: NewItem::titled(self.details.unwrap_or_default()),
            }),
            "offer" => {
                let item = item_ref(self.target, kind)?;
                let mut offer = NewOffer::new(item, self.amount?);
                offer.details = self.details.unwrap_or_default();
                offer.delivery_time = self.delivery.unwrap_or_default();
                Some(Command::Submit {
                    provider: Identity::provider(self.actor),
                    offer,
                })
            }
            "accept" | "reject" => Some(Command::Resolve {
                owner: Identity::requester(self.actor),
                offer: OfferId(self.target?),
                decision: if self.op.eq_ignore_ascii_case("accept") {
                    Decision::Accepted
                } else {
                    Decision::Rejected
                },
            }),
            "revive" => Some(Command::Revive {
                provider: Identity::provider(self.actor),
                offer: OfferId(self.target?),
                revision: OfferRevision {
                    amount: self.amount,
                    details: non_empty(self.details),
                    delivery_time: non_empty(self.delivery),
                },
            }),
            "complete" => Some(Command::Complete {
                owner: Identity::requester(self.actor),
                item: item_ref(self.target, kind)?,
            }),
            "cancel" => Some(Command::Cancel {
                owner: Identity::requester(self.actor),
                item: item_ref(self.target, kind)?,
            }),
            _ => None,
        }
    }
}

fn apply(engine: &Engine, command: Command) -> Result<(), OfferError> {
    match command {
        Command::CreateJob { owner, item } => {
            engine.create_job(owner, item);
        }
        Command::CreateProduct { owner, item } => {
            engine.create_product(owner, item);
        }
        Command::Submit { provider, offer } => {
            engine.submit_offer(&provider, offer)?;
        }
        Command::Resolve {
            owner,
            offer,
            decision,
        } => {
            engine.resolve_offer(&owner, offer, decision)?;
        }
        Command::Revive {
            provider,
            offer,
            revision,
        } => {
            engine.revive_offer(&provider, offer, revision)?;
        }
        Command::Complete { owner, item } => {
            engine.complete_item(&owner, &item)?;
        }
        Command::Cancel { owner, item } => {
            engine.cancel_item(&owner, &item)?;
        }
    }
    Ok(())
}

/// Replays commands from a CSV reader.
///
/// Malformed rows and rejected commands are skipped and logged at debug level.
///
/// # CSV Format
///
/// Expected columns: `op, actor, kind, target, amount, details, delivery`
/// - `op`: job, product, offer, accept, reject, revive, complete, cancel
/// - `actor`: acting account id
/// - `kind`: job or product (offer, complete, cancel)
/// - `target`: item id (offer, complete, cancel) or offer id (accept, reject, revive)
/// - `amount`: price (offer, optional for revive)
/// - `details`: item title or offer details
/// - `delivery`: delivery time (offer, revive)
///
/// # Example
///
/// ```csv
/// op,actor,kind,target,amount,details,delivery
/// product,1,,,,Used bike,
/// offer,2,product,1,100,Good condition,2 days
/// accept,1,,1,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_commands<R: Read>(reader: R, config: EngineConfig) -> Result<Engine, csv::Error> {
    let engine = Engine::with_config(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!(line, "skipping malformed row: {}", e);
                continue;
            }
        };

        let Some(command) = record.into_command() else {
            debug!(line, "skipping invalid command record");
            continue;
        };

        if let Err(e) = apply(&engine, command) {
            debug!(line, "skipping rejected command: {}", e);
        }
    }

    Ok(engine)
}

/// Flat row for the offer report.
#[derive(Debug, Serialize)]
struct OfferRow {
    offer: u64,
    kind: ItemKind,
    item: u64,
    provider: u64,
    amount: u64,
    status: OfferStatus,
    replaced_by: Option<u64>,
}

/// Write every offer to a CSV writer.
///
/// # CSV Format
///
/// Columns: `offer, kind, item, provider, amount, status, replaced_by`
pub fn write_offers<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for offer in engine.offers() {
        wtr.serialize(OfferRow {
            offer: offer.id.0,
            kind: offer.item.kind,
            item: offer.item.id.0,
            provider: offer.provider_id.0,
            amount: offer.amount,
            status: offer.status,
            replaced_by: offer.replaced_by.map(|id| id.0),
        })?;
    }

    wtr.flush()?;
    Ok(())
}

/// Flat row for the item report.
#[derive(Debug, Serialize)]
struct ItemRow {
    kind: ItemKind,
    item: u64,
    owner: u64,
    status: ItemStatus,
    accepted: String,
}

/// Write every item to a CSV writer.
///
/// # CSV Format
///
/// Columns: `kind, item, owner, status, accepted`, where `accepted` lists a
/// job's accepted providers separated by spaces.
pub fn write_items<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for item in engine.items() {
        let accepted = item
            .accepted_provider_ids()
            .map(|ids| {
                ids.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        wtr.serialize(ItemRow {
            kind: item.kind(),
            item: item.header().id.0,
            owner: item.owner_id().0,
            status: item.status(),
            accepted,
        })?;
    }

    wtr.flush()?;
    Ok(())
}
