//! `shelf` command line client.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand};
use futures_util::StreamExt;
use shelf_client::{
    ClientConfig, ClientError, FeedbackOutcome, MutationError, RelayClient, RestClient, Storefront,
};
use shelf_core::{BookId, CartSnapshot, ProductId};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "shelf", version, about = "Bookstore cart, feedback, and recommendations")]
struct Cli {
    /// Path to the client TOML config
    #[arg(long, global = true, env = "SHELF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the cart
    Cart,
    /// Add a product to the cart
    Add {
        product_id: u64,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        /// Unit price, used for the instant total before the server answers
        #[arg(long)]
        price: Option<f64>,
    },
    /// Remove a product from the cart
    Remove { product_id: u64 },
    /// Set a product's quantity
    Update { product_id: u64, quantity: u32 },
    /// Rate a recommended book
    #[command(group(ArgGroup::new("vote").required(true).args(["up", "down"])))]
    Feedback {
        book: u64,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        up: bool,
        #[arg(long)]
        down: bool,
    },
    /// Stream recommendations for a query
    Recommend { query: String },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref()).map_err(ClientError::from)?;

    match cli.cmd {
        Command::Recommend { query } => recommend(&config, &query).await,
        cmd => run_store(&config, cmd).await,
    }
}

async fn run_store(config: &ClientConfig, cmd: Command) -> Result<(), CliError> {
    let store = Storefront::new(Arc::new(RestClient::new(config)?));
    store.load_cart().await?;

    match cmd {
        Command::Cart => {}
        Command::Add {
            product_id,
            quantity,
            price,
        } => {
            let ack = store
                .add_to_cart(ProductId(product_id), quantity, price)
                .await?;
            println!("{}", ack.message);
        }
        Command::Remove { product_id } => {
            let ack = store.remove_from_cart(ProductId(product_id)).await?;
            println!("{}", ack.message);
        }
        Command::Update {
            product_id,
            quantity,
        } => {
            let ack = store.update_quantity(ProductId(product_id), quantity).await?;
            println!("{}", ack.message);
        }
        Command::Feedback {
            book, query, up, ..
        } => {
            match store.vote(BookId(book), &query, up).await? {
                FeedbackOutcome::Recorded(state) => println!("Feedback recorded: {:?}", state),
                FeedbackOutcome::Unchanged => println!("Feedback unchanged"),
                FeedbackOutcome::Busy => println!("Feedback already in flight"),
            }
            return Ok(());
        }
        Command::Recommend { .. } => return Ok(()),
    }

    print_cart(store.cart()?.unwrap_or_default());
    Ok(())
}

fn print_cart(cart: CartSnapshot) {
    for line in &cart.products {
        println!(
            "{:>6}  {:<40} {:>3} x {:>8.2} = {:>9.2}",
            line.product_id,
            line.name,
            line.quantity,
            line.effective_price(),
            line.line_total
        );
    }
    println!(
        "Total: {:.2} ({} items) [{}]",
        cart.total,
        cart.count,
        cart.badge().unwrap_or_default()
    );
}

async fn recommend(config: &ClientConfig, query: &str) -> Result<(), CliError> {
    let relay = RelayClient::new(config)?;
    let mut stream = relay.recommend(query).await?;
    let mut stdout = std::io::stdout();
    while let Some(chunk) = stream.next().await {
        stdout.write_all(&chunk?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
