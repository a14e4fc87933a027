//! Local simulation of the orchestrator.
//!
//! Classifies free text by keyword and synthesizes a price quote, a news
//! digest, or an echo. The category is deterministic; the quoted price is not.

use std::ops::Range;
use std::time::Duration;

use rand::Rng;

const PRICE_KEYWORDS: [&str; 3] = ["price", "harga", "berapa"];
const NEWS_KEYWORDS: [&str; 3] = ["news", "berita", "update"];

/// Maximum relative deviation of a synthetic price from its base.
pub const PRICE_SPREAD: f64 = 0.1;

pub const NEWS_DIGEST: &str = "Berita terkini: 1) Exchange X mengumumkan listing baru. \
2) Token Y mengalami lonjakan harga 12%. (mocked)";

/// Artificial latency, sampled uniformly per simulated reply.
pub const DEFAULT_LATENCY: Range<Duration> = Duration::from_millis(400)..Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coin {
    Bitcoin,
    Ethereum,
    Solana,
}

impl Coin {
    /// Substring match on lowercased text; Ethereum beats Solana, Bitcoin is the default.
    pub fn detect(lowered: &str) -> Self {
        if lowered.contains("ethereum") {
            Coin::Ethereum
        } else if lowered.contains("solana") {
            Coin::Solana
        } else {
            Coin::Bitcoin
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Coin::Bitcoin => "Bitcoin",
            Coin::Ethereum => "Ethereum",
            Coin::Solana => "Solana",
        }
    }

    pub fn base_price(&self) -> u64 {
        match self {
            Coin::Bitcoin => 65_000,
            Coin::Ethereum => 1_800,
            Coin::Solana => 20,
        }
    }
}

/// Which branch of the simulation answers a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Price(Coin),
    News,
    Echo,
}

impl Intent {
    pub fn classify(text: &str) -> Self {
        let lowered = text.to_lowercase();
        if PRICE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            Intent::Price(Coin::detect(&lowered))
        } else if NEWS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            Intent::News
        } else {
            Intent::Echo
        }
    }
}

/// `base * (1 + u)`, `u` uniform in `[-0.1, 0.1)`, rounded to the nearest integer.
pub fn synthetic_price<R: Rng>(coin: Coin, rng: &mut R) -> u64 {
    let factor = 1.0 + rng.random_range(-PRICE_SPREAD..PRICE_SPREAD);
    (coin.base_price() as f64 * factor).round() as u64
}

pub fn price_quote(coin: Coin, price: u64) -> String {
    format!("Harga {} saat ini adalah ${} USD.", coin.name(), price)
}

pub fn echo_reply(text: &str) -> String {
    format!("Mock reply: saya mengerti — \"{}\"", text)
}

/// Reply text for an already classified intent. Echo uses the client-side template.
pub fn compose(intent: Intent, text: &str) -> String {
    match intent {
        Intent::Price(coin) => price_quote(coin, synthetic_price(coin, &mut rand::rng())),
        Intent::News => NEWS_DIGEST.to_string(),
        Intent::Echo => echo_reply(text),
    }
}

/// Always-successful stand-in for the remote orchestrator.
#[derive(Debug, Clone)]
pub struct FallbackResponder {
    latency: Range<Duration>,
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackResponder {
    pub fn new() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
        }
    }

    pub fn with_latency(latency: Range<Duration>) -> Self {
        Self { latency }
    }

    /// No artificial delay.
    pub fn instant() -> Self {
        Self::with_latency(Duration::ZERO..Duration::ZERO)
    }

    pub async fn simulate(&self, text: &str) -> String {
        let delay = self.sample_latency();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        compose(Intent::classify(text), text)
    }

    fn sample_latency(&self) -> Duration {
        if self.latency.is_empty() {
            self.latency.start
        } else {
            rand::rng().random_range(self.latency.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn price_in(reply: &str) -> u64 {
        let re = Regex::new(r"\$(\d+) USD\.$").unwrap();
        re.captures(reply).unwrap()[1].parse().unwrap()
    }

    fn assert_within_spread(coin: Coin, price: u64) {
        let base = coin.base_price() as f64;
        let p = price as f64;
        assert!(
            p >= (base * 0.9).floor() && p <= (base * 1.1).ceil(),
            "{} price {} outside ±10% of {}",
            coin.name(),
            price,
            base
        );
    }

    #[test]
    fn test_price_keywords_are_case_insensitive() {
        assert_eq!(Intent::classify("PRICE of btc"), Intent::Price(Coin::Bitcoin));
        assert_eq!(Intent::classify("Harga solana?"), Intent::Price(Coin::Solana));
        assert_eq!(Intent::classify("berapa ETHEREUM"), Intent::Price(Coin::Ethereum));
    }

    #[test]
    fn test_coin_priority() {
        assert_eq!(
            Intent::classify("price of solana vs ethereum"),
            Intent::Price(Coin::Ethereum)
        );
        assert_eq!(Intent::classify("price of dogecoin"), Intent::Price(Coin::Bitcoin));
    }

    #[test]
    fn test_price_beats_news() {
        assert_eq!(
            Intent::classify("news about the price"),
            Intent::Price(Coin::Bitcoin)
        );
    }

    #[test]
    fn test_news_keywords() {
        assert_eq!(Intent::classify("any NEWS today?"), Intent::News);
        assert_eq!(Intent::classify("berita terbaru"), Intent::News);
        assert_eq!(Intent::classify("give me an update"), Intent::News);
        assert_eq!(compose(Intent::News, "news"), NEWS_DIGEST);
    }

    #[test]
    fn test_echo_contains_input_verbatim() {
        let text = "Halo, Pluto! \"quoted\" ünïcode";
        assert_eq!(Intent::classify(text), Intent::Echo);
        let reply = compose(Intent::Echo, text);
        assert!(reply.contains(text));
        assert_eq!(reply, echo_reply(text));
    }

    #[test]
    fn test_synthetic_price_stays_within_spread() {
        let mut rng = rand::rng();
        for coin in [Coin::Bitcoin, Coin::Ethereum, Coin::Solana] {
            for _ in 0..500 {
                assert_within_spread(coin, synthetic_price(coin, &mut rng));
            }
        }
    }

    #[test]
    fn test_quote_names_exactly_one_coin() {
        for _ in 0..50 {
            let reply = compose(Intent::classify("price ethereum and solana"), "");
            assert!(reply.starts_with("Harga Ethereum saat ini adalah $"));
            assert!(!reply.contains("Solana"));
            assert!(!reply.contains("Bitcoin"));
            assert_within_spread(Coin::Ethereum, price_in(&reply));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_waits_within_latency_window() {
        let responder = FallbackResponder::new();
        let started = tokio::time::Instant::now();
        let reply = responder.simulate("What's the price of Ethereum?").await;
        let waited = started.elapsed();

        assert!(waited >= Duration::from_millis(400), "waited {:?}", waited);
        assert!(waited <= Duration::from_millis(1000), "waited {:?}", waited);

        let re = Regex::new(r"^Harga Ethereum saat ini adalah \$(\d+) USD\.$").unwrap();
        let price: u64 = re.captures(&reply).unwrap()[1].parse().unwrap();
        assert!((1620..=1980).contains(&price));
    }

    #[tokio::test]
    async fn test_instant_responder_does_not_sleep() {
        let responder = FallbackResponder::instant();
        let reply = responder.simulate("hello").await;
        assert_eq!(reply, echo_reply("hello"));
    }
}
