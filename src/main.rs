// tixmesh CLI - operate a ticket economy kept in a local sled store

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tixmesh::clock::{format_timestamp, parse_timestamp, Clock, ManualClock, SystemClock};
use tixmesh::config::EconomyConfig;
use tixmesh::event::Receipt;
use tixmesh::exchange::{ExchangeError, NewEvent, TicketExchange};
use tixmesh::identity::Address;
use tixmesh::market::{ListingId, Purchase, ResaleOffer};
use tixmesh::storage::TicketStore;
use tixmesh::{Amount, ClassId, Quantity};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

type Exchange = TicketExchange<Arc<dyn Clock>>;

/// Phase-gated event ticket economy
#[derive(Parser)]
#[command(name = "tixmesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store directory
    #[arg(short, long, global = true, env = "TIXMESH_STORE", default_value = "tixmesh-data")]
    store: PathBuf,

    /// Act as if the current time were this RFC 3339 instant
    #[arg(long, global = true)]
    at: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new marketplace in the store
    Init {
        /// Marketplace owner (label or 0x address)
        #[arg(long)]
        owner: String,
    },

    /// Allow an organiser to create official listings
    ApproveOrganiser {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        organiser: String,
    },

    /// Issue tickets and open an event
    CreateEvent {
        #[arg(long)]
        organiser: String,
        #[arg(long)]
        name: String,
        /// Event date, RFC 3339
        #[arg(long)]
        date: String,
        #[arg(long, default_value_t = 0)]
        class: ClassId,
        #[arg(long)]
        supply: Quantity,
        #[arg(long)]
        price: Amount,
        #[arg(long)]
        uri: Option<String>,
    },

    /// Let the event engine move a holder's tickets
    Approve {
        #[arg(long)]
        holder: String,
        #[arg(long)]
        event: String,
        #[arg(long)]
        revoke: bool,
    },

    /// List the organiser's inventory of a class
    ListOfficial {
        #[arg(long)]
        organiser: String,
        #[arg(long)]
        event: String,
        #[arg(long, default_value_t = 0)]
        class: ClassId,
    },

    /// Offer held tickets for resale
    ListResale {
        #[arg(long)]
        seller: String,
        #[arg(long)]
        event: String,
        #[arg(long, default_value_t = 0)]
        class: ClassId,
        #[arg(long)]
        quantity: Quantity,
        #[arg(long)]
        price: Amount,
    },

    /// Buy from an official listing
    BuyOfficial {
        #[arg(long)]
        buyer: String,
        #[arg(long)]
        event: String,
        #[arg(long)]
        listing: u64,
        #[arg(long)]
        quantity: Quantity,
        #[arg(long)]
        payment: Amount,
    },

    /// Buy from a resale listing
    BuyResale {
        #[arg(long)]
        buyer: String,
        #[arg(long)]
        event: String,
        #[arg(long)]
        listing: u64,
        #[arg(long)]
        quantity: Quantity,
        #[arg(long)]
        payment: Amount,
    },

    /// Redeem tickets at the door
    Use {
        #[arg(long)]
        holder: String,
        #[arg(long)]
        event: String,
        #[arg(long, default_value_t = 0)]
        class: ClassId,
        #[arg(long)]
        quantity: Quantity,
    },

    /// Vote for refunds
    Vote {
        #[arg(long)]
        holder: String,
        #[arg(long)]
        event: String,
    },

    /// Claim a refund after a successful vote
    ClaimRefund {
        #[arg(long)]
        holder: String,
        #[arg(long)]
        event: String,
    },

    /// Release escrow to the organiser
    Withdraw {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        event: String,
    },

    /// Print events and listings
    Show {
        /// Restrict to one event
        #[arg(long)]
        event: Option<String>,
    },
}

/// Labels become deterministic addresses; `0x` strings are parsed
fn account(s: &str) -> Result<Address, ExchangeError> {
    if s.starts_with("0x") {
        Ok(Address::parse(s)?)
    } else {
        Ok(Address::from_label(s))
    }
}

fn print_receipt(receipt: &Receipt) {
    println!("{}", receipt.event());
    for payout in receipt.payouts() {
        println!("  pay {} -> {} ({:?})", payout.amount(), payout.to(), payout.kind());
    }
}

fn clock(at: Option<&str>) -> Result<Arc<dyn Clock>, ExchangeError> {
    let clock: Arc<dyn Clock> = match at {
        Some(at) => Arc::new(ManualClock::new(parse_timestamp(at)?)),
        None => Arc::new(SystemClock),
    };
    Ok(clock)
}

fn show(exchange: &Exchange, only: Option<Address>) {
    let now = exchange.now();
    println!("now: {}", format_timestamp(now));

    for engine in exchange.events() {
        if only.is_some_and(|a| a != *engine.address()) {
            continue;
        }
        println!(
            "event {} {:?} phase={} sold={} votes={} escrow={} threshold_met={}",
            engine.address(),
            engine.name(),
            engine.phase(now),
            engine.total_tickets_sold(),
            engine.refund_votes(),
            engine.escrow().balance(),
            engine.refund_threshold_met()
        );
        for listing in exchange.registry().active_listings_for(engine.address()) {
            println!(
                "  {} {} seller={} class={} remaining={} price={}",
                listing.kind(),
                listing.id(),
                listing.seller().short(),
                listing.class_id(),
                listing.remaining(),
                listing.price_per_unit()
            );
        }
    }
}

fn run(cli: Cli) -> Result<(), ExchangeError> {
    let store = TicketStore::open(&cli.store)?;
    let clock = clock(cli.at.as_deref())?;

    if let Commands::Init { owner } = &cli.command {
        if store.load_state()?.is_some() {
            return Err(ExchangeError::AlreadyInitialised);
        }
        let config = EconomyConfig::from_env()?;
        let exchange: Exchange = TicketExchange::new(config, account(owner)?, clock)?;
        exchange.save(&store)?;
        println!("marketplace {}", exchange.registry().address());
        return Ok(());
    }

    let mut exchange: Exchange = TicketExchange::load(&store, clock)?;

    match cli.command {
        Commands::Init { .. } => {}
        Commands::ApproveOrganiser { caller, organiser } => {
            let organiser = account(&organiser)?;
            exchange.approve_organiser(&account(&caller)?, &organiser)?;
            println!("approved {}", organiser);
        }
        Commands::CreateEvent {
            organiser,
            name,
            date,
            class,
            supply,
            price,
            uri,
        } => {
            let mut new_event = NewEvent::new(name, parse_timestamp(&date)?).with_class(class, supply, price);
            if let Some(uri) = uri {
                new_event = new_event.with_uri(uri);
            }
            let address = exchange.create_event(&account(&organiser)?, new_event)?;
            println!("event {}", address);
        }
        Commands::Approve { holder, event, revoke } => {
            let event = account(&event)?;
            exchange.set_approval_for_all(&account(&holder)?, &event, &event, !revoke)?;
            println!("{} engine {}", if revoke { "revoked" } else { "approved" }, event);
        }
        Commands::ListOfficial { organiser, event, class } => {
            let id = exchange.list_official(&account(&organiser)?, &account(&event)?, class)?;
            println!("official listing {}", id);
        }
        Commands::ListResale {
            seller,
            event,
            class,
            quantity,
            price,
        } => {
            let offer = ResaleOffer {
                event: account(&event)?,
                price_per_unit: price,
                class_id: class,
                quantity,
            };
            let id = exchange.list_resale(&account(&seller)?, &offer)?;
            println!("resale listing {}", id);
        }
        Commands::BuyOfficial {
            buyer,
            event,
            listing,
            quantity,
            payment,
        } => {
            let purchase = Purchase {
                event: account(&event)?,
                listing_id: ListingId::new(listing),
                quantity,
                payment,
            };
            print_receipt(&exchange.buy_official(&account(&buyer)?, &purchase)?);
        }
        Commands::BuyResale {
            buyer,
            event,
            listing,
            quantity,
            payment,
        } => {
            let purchase = Purchase {
                event: account(&event)?,
                listing_id: ListingId::new(listing),
                quantity,
                payment,
            };
            print_receipt(&exchange.buy_resale(&account(&buyer)?, &purchase)?);
        }
        Commands::Use {
            holder,
            event,
            class,
            quantity,
        } => {
            print_receipt(&exchange.use_tickets(&account(&holder)?, &account(&event)?, class, quantity)?);
        }
        Commands::Vote { holder, event } => {
            print_receipt(&exchange.vote_for_refund(&account(&holder)?, &account(&event)?)?);
        }
        Commands::ClaimRefund { holder, event } => {
            print_receipt(&exchange.claim_refund(&account(&holder)?, &account(&event)?)?);
        }
        Commands::Withdraw { caller, event } => {
            print_receipt(&exchange.withdraw(&account(&caller)?, &account(&event)?)?);
        }
        Commands::Show { event } => {
            let only = event.as_deref().map(account).transpose()?;
            show(&exchange, only);
            return Ok(());
        }
    }

    exchange.save(&store)?;
    info!(store = %cli.store.display(), "state saved");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tixmesh=info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.ticket_error() {
                Some(reason) => error!(code = reason.code(), "{}", reason),
                None => error!("{}", e),
            }
            ExitCode::FAILURE
        }
    }
}
