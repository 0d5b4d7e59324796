use std::env;
use std::sync::Arc;

use anyhow::Result;
use deedtrace::{ChatCompletionClient, Config, Pipeline, TavilySearchClient, ZipDirectory};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <address>", args[0]);
        eprintln!("  address: street address including zip, e.g. \"8 Lynnbrook Road, 06824\"");
        eprintln!();
        eprintln!("Required env: SEARCH_API_KEY, COMPLETION_API_KEY");
        std::process::exit(1);
    }
    let address = args[1..].join(" ");

    let config = Config::from_env()?;
    let zips = Arc::new(ZipDirectory::load(&config.zip_table_path)?);
    eprintln!("Loaded {} zip records", zips.len());

    let search = TavilySearchClient::new(config.search_api_url.as_str(), config.search_api_key.as_str());
    let completion = ChatCompletionClient::new(
        config.completion_api_url.as_str(),
        config.completion_api_key.as_str(),
        config.completion_model.as_str(),
    );
    let pipeline = Pipeline::new(zips, search, completion, config.assessor_domain.as_str());

    println!("Resolving {}...", address);
    let history = pipeline.resolve(&address).await?;

    println!(
        "\nLocation: {}, {} County, {} ({})",
        history.city, history.county, history.state, history.zipcode
    );
    println!("FIPS: {}", history.county_fips);
    println!("Source: {}", history.search_url);

    if history.transactions.is_empty() {
        println!("\nNo transactions found.");
    } else {
        println!("\nTransactions:");
        for tx in &history.transactions {
            println!(
                "  {} | {} | {} -> {}",
                tx.sale_date, tx.sale_price, tx.seller, tx.buyer
            );
        }
    }

    Ok(())
}
