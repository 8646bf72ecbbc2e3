//! Utility functions for the dataset generator
//! Seeded helpers for ids, tokens, addresses and coordinate noise

use std::net::Ipv4Addr;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::config::City;

/// Build the run's master generator. Unseeded runs draw from the OS.
pub fn master_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draw an independent sub-generator for one phase or shard
pub fn derive_rng<R: Rng + ?Sized>(master: &mut R) -> StdRng {
    StdRng::seed_from_u64(master.gen::<u64>())
}

/// Uniform pick from a non-empty slice
pub fn pick<'a, T, R: Rng + ?Sized>(rng: &mut R, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

/// UUID built from the run's generator so ids are reproducible under a seed
pub fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.gen::<[u8; 16]>()).into_uuid()
}

/// Short lowercase hex token for synthetic receiver ids
pub fn random_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    hex::encode(rng.gen::<[u8; 4]>())
}

/// Address from 10.0.0.0/8 or 192.168.0.0/16
pub fn private_ip<R: Rng + ?Sized>(rng: &mut R) -> Ipv4Addr {
    if rng.gen_bool(0.5) {
        Ipv4Addr::new(10, rng.gen(), rng.gen(), rng.gen_range(1..255))
    } else {
        Ipv4Addr::new(192, 168, rng.gen(), rng.gen_range(1..255))
    }
}

/// Publicly routable address
pub fn public_ip<R: Rng + ?Sized>(rng: &mut R) -> Ipv4Addr {
    loop {
        let ip = Ipv4Addr::new(
            rng.gen_range(1..224),
            rng.gen(),
            rng.gen(),
            rng.gen_range(1..255),
        );
        if is_public(ip) {
            return ip;
        }
    }
}

pub fn is_public(ip: Ipv4Addr) -> bool {
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.octets()[0] == 0
        || (ip.octets()[0] == 100 && (64..128).contains(&ip.octets()[1])))
}

/// City coordinates with up to `max_offset` degrees of noise on each axis
pub fn jittered_coordinates<R: Rng + ?Sized>(rng: &mut R, city: &City, max_offset: f64) -> (f64, f64) {
    (
        city.latitude + rng.gen_range(-max_offset..=max_offset),
        city.longitude + rng.gen_range(-max_offset..=max_offset),
    )
}

/// Uniform instant inside `[start, end]`, whole seconds
pub fn random_instant<R: Rng + ?Sized>(
    rng: &mut R,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> DateTime<Utc> {
    let span = (end - start).num_seconds().max(0);
    start + Duration::seconds(rng.gen_range(0..=span))
}

/// Amounts are kept to two decimal places
pub fn round_amount(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn random_amount<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    round_amount(rng.gen_range(min..=max))
}

/// Format an amount in rupees for summaries
pub fn format_currency(amount: f64) -> String {
    format!("₹{:.2}", amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let mut a = master_rng(Some(9));
        let mut b = master_rng(Some(9));
        assert_eq!(random_uuid(&mut a), random_uuid(&mut b));
        assert_eq!(random_token(&mut a), random_token(&mut b));

        let mut child_a = derive_rng(&mut a);
        let mut child_b = derive_rng(&mut b);
        assert_eq!(child_a.gen::<u64>(), child_b.gen::<u64>());
    }

    #[test]
    fn test_token_format() {
        let mut rng = master_rng(Some(1));
        let token = random_token(&mut rng);
        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ip_ranges() {
        let mut rng = master_rng(Some(3));
        for _ in 0..500 {
            assert!(private_ip(&mut rng).is_private());
            assert!(is_public(public_ip(&mut rng)));
        }
    }

    #[test]
    fn test_jitter_is_bounded() {
        let mut rng = master_rng(Some(5));
        let city = City::new("Pune", 18.5204, 73.8567);
        for _ in 0..200 {
            let (lat, lon) = jittered_coordinates(&mut rng, &city, 0.01);
            assert!((lat - city.latitude).abs() <= 0.01 + 1e-9);
            assert!((lon - city.longitude).abs() <= 0.01 + 1e-9);
        }
    }

    #[test]
    fn test_random_instant_in_window() {
        let mut rng = master_rng(Some(11));
        let start = Utc::now();
        let end = start + Duration::hours(2);
        for _ in 0..100 {
            let t = random_instant(&mut rng, start, end);
            assert!(t >= start && t <= end);
        }
    }

    #[test]
    fn test_amount_rounding() {
        assert_eq!(round_amount(10.126), 10.13);
        assert_eq!(format_currency(1500.5), "₹1500.50");
    }
}
