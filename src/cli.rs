use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use peershare::peer::PeerSession;
use peershare::record::Listing;

type Input = Lines<BufReader<Stdin>>;

/// Maps operator commands onto the session until `quit` or end of input.
pub async fn run_prompt(session: &PeerSession) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    println!("Commands: connect, add [file], list, quit");

    loop {
        let Some(line) = prompt(&mut input, "> ").await? else {
            return Ok(());
        };

        let mut words = line.split_whitespace();
        match words.next() {
            Some("connect") => match session.connect().await {
                Ok(()) => println!("Connected to tracker"),
                Err(e) => eprintln!("Connect failed: {:#}", e),
            },
            Some("add") => {
                let name = words.collect::<Vec<_>>().join(" ");
                add(session, &mut input, name).await?;
            }
            Some("list") => list(session, &mut input).await?,
            Some("quit") => {
                if let Err(e) = session.quit().await {
                    eprintln!("Quit failed: {:#}", e);
                }
                return Ok(());
            }
            Some(other) => eprintln!("Unknown command: {}", other),
            None => {}
        }
    }
}

async fn prompt(input: &mut Input, text: &str) -> Result<Option<String>> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

/// Asks for an index into a list of `len` entries. Anything out of range skips.
async fn select(input: &mut Input, len: usize, text: &str) -> Result<Option<usize>> {
    let Some(answer) = prompt(input, text).await? else {
        return Ok(None);
    };
    Ok(answer
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|index| *index < len))
}

async fn add(session: &PeerSession, input: &mut Input, name: String) -> Result<()> {
    let name = if name.is_empty() {
        let files = match session.store().list().await {
            Ok(files) => files,
            Err(e) => {
                eprintln!("Cannot list {}: {}", session.store().root().display(), e);
                return Ok(());
            }
        };
        if files.is_empty() {
            println!("Nothing to share in {}", session.store().root().display());
            return Ok(());
        }
        for (i, file) in files.iter().enumerate() {
            println!("{}\t{}", i, file);
        }
        match select(input, files.len(), "File to share: ").await? {
            Some(index) => files[index].clone(),
            None => {
                eprintln!("Invalid selection");
                return Ok(());
            }
        }
    } else {
        name
    };

    match session.share(&name).await {
        Ok(record) => println!("Shared {} ({})", record.name, format_bytes(record.size)),
        Err(e) => eprintln!("Add failed: {:#}", e),
    }
    Ok(())
}

async fn list(session: &PeerSession, input: &mut Input) -> Result<()> {
    let listings = match session.list().await {
        Ok(listings) => listings,
        Err(e) => {
            eprintln!("List failed: {:#}", e);
            return Ok(());
        }
    };

    if listings.is_empty() {
        println!("No files shared yet");
        return Ok(());
    }
    for (i, listing) in listings.iter().enumerate() {
        print_listing(i, listing);
    }

    let Some(index) = select(input, listings.len(), "File to download (-1 to skip): ").await?
    else {
        return Ok(());
    };
    let listing = &listings[index];

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Fetching {}", listing.record.name));
    spinner.enable_steady_tick(Duration::from_millis(100));

    match session.fetch(listing).await {
        Ok(path) => spinner.finish_with_message(format!("Saved {}", path.display())),
        Err(e) => {
            spinner.finish_and_clear();
            eprintln!("Download failed: {:#}", e);
        }
    }
    Ok(())
}

fn print_listing(index: usize, listing: &Listing) {
    let owners = listing
        .owners
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "{}\t{}\t{}\t{}\t[{}]",
        index,
        listing.record.name,
        format_bytes(listing.record.size),
        listing.record.hash,
        owners
    );
}

/// Format byte count as human-readable string (e.g. "631.0 MB").
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
