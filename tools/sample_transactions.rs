//! Sample Transaction Generator
//!
//! Writes a synthetic transaction CSV for exercising the scoring service and
//! the artifact fitter. Rows include missing cells and occasional category
//! values outside the usual vocabulary.
//!
//! Usage: sample-transactions <output.csv> [count] [fraud_rate] [labelled]

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use tracing::info;

const HEADER: &[&str] = &[
    "TransactionID",
    "isFraud",
    "TransactionDT",
    "TransactionAmt",
    "ProductCD",
    "card4",
    "card6",
    "addr1",
    "dist1",
    "P_emaildomain",
    "DeviceType",
];

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
    start_dt: i64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
            start_dt: Utc::now().timestamp() % 86_400,
        }
    }

    /// Generate a random legitimate transaction
    fn generate_legitimate(&mut self) -> Vec<String> {
        let amount = self.rng.gen_range(10.0..500.0);
        let product = self.random_choice(&["W", "C", "R", "H"]);
        let card4 = self.random_choice(&["visa", "mastercard", "american express"]);
        let card6 = self.random_choice(&["debit", "credit"]);
        let email = self.random_choice(&["gmail.com", "yahoo.com", "outlook.com", ""]);
        let device = self.random_choice(&["desktop", "mobile", ""]);
        let dist = self.rng.gen_range(0.0..100.0);
        self.row(false, amount, product, card4, card6, dist, email, device)
    }

    /// Generate a suspicious/fraudulent transaction
    fn generate_suspicious(&mut self) -> Vec<String> {
        let amount = self.rng.gen_range(1000.0..10000.0); // High amount
        let product = self.random_choice(&["C", "W"]);
        // Includes a card network the encoders may not have seen
        let card4 = self.random_choice(&["visa", "discover", "unionpay"]);
        let card6 = "credit";
        let email = self.random_choice(&["tempmail.com", "protonmail.com", "anonymous.com"]);
        let device = "mobile";
        let dist = self.rng.gen_range(500.0..5000.0); // Large distance
        self.row(true, amount, product, card4, card6, dist, email, device)
    }

    #[allow(clippy::too_many_arguments)]
    fn row(
        &mut self,
        is_fraud: bool,
        amount: f64,
        product: &str,
        card4: &str,
        card6: &str,
        dist: f64,
        email: &str,
        device: &str,
    ) -> Vec<String> {
        self.transaction_counter += 1;
        let dt = self.start_dt + self.transaction_counter as i64 * self.rng.gen_range(1..120);
        // Roughly a fifth of rows lack an address
        let addr = if self.rng.gen_bool(0.2) {
            String::new()
        } else {
            self.rng.gen_range(100..540).to_string()
        };

        vec![
            (2_987_000 + self.transaction_counter).to_string(),
            u8::from(is_fraud).to_string(),
            dt.to_string(),
            format!("{:.2}", amount),
            product.to_string(),
            card4.to_string(),
            card6.to_string(),
            addr,
            format!("{:.1}", dist),
            email.to_string(),
            device.to_string(),
        ]
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_transactions=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(output) = args.get(1) else {
        anyhow::bail!("usage: sample-transactions <output.csv> [count] [fraud_rate] [labelled]");
    };
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let labelled = args.get(4).map(|s| s == "labelled" || s == "true").unwrap_or(false);

    info!(
        output = %output,
        count = count,
        fraud_rate = fraud_rate,
        labelled = labelled,
        "Configuration loaded"
    );

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output))?;

    let label_index = HEADER.iter().position(|h| *h == "isFraud");
    let keep = |index: usize| labelled || Some(index) != label_index;

    let header: Vec<&str> = HEADER
        .iter()
        .enumerate()
        .filter(|(i, _)| keep(*i))
        .map(|(_, h)| *h)
        .collect();
    writer.write_record(&header)?;

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();
    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for _ in 0..count {
        let row = if rng.gen_bool(fraud_rate.clamp(0.0, 1.0)) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        let row: Vec<&String> = row.iter().enumerate().filter(|(i, _)| keep(*i)).map(|(_, v)| v).collect();
        writer.write_record(row)?;
    }
    writer.flush()?;

    info!(
        "Completed! Wrote {} transactions ({} legitimate, {} suspicious)",
        count, legitimate_count, suspicious_count
    );

    Ok(())
}
