use proptest::prelude::*;

use tokendrop::address_parser::normalize_addresses;
use tokendrop::batch_search::{find_max_batch_size, FnProbe, ProbeVerdict};
use tokendrop::collaborators::{NoBlacklist, SimulatedWallet};
use tokendrop::executor::{AirdropRunner, RunState};
use tokendrop::notifications::NotificationLog;
use tokendrop::retry::RetryPolicy;
use tokendrop::session::AirdropSession;
use tokendrop::types::{AssetUnit, RecipientAddress, SelectedAsset, BECH32_CHARSET, MIN_ADDRESS_DATA_LEN};

fn address_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("addr1"), Just("addr_test1")],
        "[qpzry9x8gf2tvdw0s3jn54khce6mua7l]{50,70}",
    )
        .prop_map(|(prefix, data)| format!("{}{}", prefix, data))
}

fn distinct_addresses(n: usize) -> Vec<RecipientAddress> {
    let charset = BECH32_CHARSET.as_bytes();
    (0..n)
        .map(|i| {
            let raw = format!(
                "addr1{}{}{}",
                charset[i % 32] as char,
                charset[(i / 32) % 32] as char,
                "x".repeat(56)
            );
            RecipientAddress::parse(&raw).unwrap()
        })
        .collect()
}

/// Builder that rejects anything above `limit` outputs.
fn limited(limit: usize) -> FnProbe<impl Fn(usize) -> Result<ProbeVerdict, tokendrop::collaborators::TxError> + Send + Sync> {
    FnProbe(move |n| {
        if n > limit {
            Ok(ProbeVerdict::BuildRejected("too many outputs".into()))
        } else {
            Ok(ProbeVerdict::Feasible)
        }
    })
}

const JUNK: [&str; 5] = ["", "hello world", "addr1short", "stake1uxyzqpzry9x8gf2tvdw0s3jn54khce6mua7l", "#"];

/// Render one address the way users paste them: quoted, padded, shouted or mangled.
fn decorate(address: &str, style: u8, junk: usize) -> String {
    match style % 9 {
        0 => address.to_string(),
        1 => format!("\"{}\"", address),
        2 => format!("'{}'", address),
        3 => format!("\"{}'", address),
        4 => format!("\"{}", address),
        5 => address.to_uppercase(),
        6 => format!(" \t{}  ", address),
        7 => format!("{},note for {}", address, junk),
        _ => JUNK[junk % JUNK.len()].to_string(),
    }
}

fn separator(kind: u8) -> &'static str {
    match kind % 5 {
        0 => "\n",
        1 => "\r\n",
        2 => "\r",
        3 => ",",
        _ => " , ",
    }
}

proptest! {
    /// Feeding the cleaned list back in changes nothing.
    #[test]
    fn dedup_is_idempotent(
        pool in prop::collection::vec(address_strategy(), 1..20),
        pieces in prop::collection::vec((0usize..100, any::<u8>(), any::<u8>()), 1..60),
        bom in any::<bool>(),
    ) {
        let mut input = String::new();
        if bom {
            input.push('\u{feff}');
        }
        for (i, (pick, style, sep)) in pieces.iter().enumerate() {
            if i > 0 {
                input.push_str(separator(*sep));
            }
            input.push_str(&decorate(&pool[pick % pool.len()], *style, *pick));
        }
        let first = normalize_addresses(&input);

        let cleaned: Vec<&str> = first.valid_addresses.iter().map(|a| a.as_str()).collect();
        let second = normalize_addresses(&cleaned.join("\n"));
        prop_assert_eq!(&second.valid_addresses, &first.valid_addresses);
        prop_assert!(second.duplicates.is_empty());
        prop_assert!(second.invalid.is_empty());

        let crlf = normalize_addresses(&format!("\u{feff}{}", cleaned.join("\r\n")));
        prop_assert_eq!(&crlf.valid_addresses, &first.valid_addresses);

        let mut sorted = first.valid_addresses.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), first.valid_addresses.len(), "no address appears twice");
        for address in &first.valid_addresses {
            prop_assert!(pool.iter().any(|p| p == address.as_str()));
        }
    }

    /// Anything accepted has a known prefix and enough charset data after it.
    #[test]
    fn accepted_addresses_are_well_formed(candidate in "(addr1|addr_test1|stake1)?[a-z0-9_]{0,80}") {
        if let Ok(address) = RecipientAddress::parse(&candidate) {
            let s = address.as_str();
            let data = s.strip_prefix("addr_test1").or_else(|| s.strip_prefix("addr1"));
            prop_assert!(data.is_some());
            let data = data.unwrap();
            prop_assert!(data.len() >= MIN_ADDRESS_DATA_LEN);
            prop_assert!(data.chars().all(|c| BECH32_CHARSET.contains(c)));
        }
    }

    /// More balance never yields a smaller batch.
    #[test]
    fn batch_size_is_monotonic_in_balance(
        n in 1usize..120,
        amount in 1u64..1_000,
        limit in 1usize..150,
        b1 in 0u64..200_000,
        extra in 0u64..200_000,
    ) {
        let addresses = distinct_addresses(n);
        let probe = limited(limit);
        let retry = RetryPolicy::none();
        let small = tokio_test::block_on(find_max_batch_size(&addresses, amount, b1, &probe, &retry));
        let large = tokio_test::block_on(find_max_batch_size(&addresses, amount, b1 + extra, &probe, &retry));
        if let Ok(small) = small {
            let large = large.unwrap();
            prop_assert!(small.batch_size <= large.batch_size);
        }
    }

    /// The chosen size fits the balance and the next size up does not fit.
    #[test]
    fn batch_size_respects_balance(
        n in 1usize..120,
        amount in 1u64..1_000,
        limit in 1usize..150,
        balance in 0u64..200_000,
    ) {
        let addresses = distinct_addresses(n);
        let result = tokio_test::block_on(
            find_max_batch_size(&addresses, amount, balance, &limited(limit), &RetryPolicy::none()),
        );
        match result {
            Ok(plan) => {
                let b = plan.batch_size;
                prop_assert!(b >= 1 && b <= n);
                prop_assert!(b as u128 * amount as u128 <= balance as u128);
                let next_fits = b < n
                    && (b + 1) as u128 * amount as u128 <= balance as u128
                    && b < limit;
                prop_assert!(!next_fits, "size {} is not maximal", b);
            }
            Err(_) => prop_assert!(amount > balance),
        }
    }

    /// A completed run pays every recipient once, in order, in ceil(N/B) batches.
    #[test]
    fn completed_run_covers_every_recipient(
        n in 1usize..80,
        max_outputs in 1usize..30,
        amount in 1u64..50,
    ) {
        let addresses = distinct_addresses(n);
        let balance = amount * n as u64;
        let wallet = SimulatedWallet::new()
            .with_balance(AssetUnit::Lovelace, balance)
            .with_max_outputs(Some(max_outputs));

        let mut session = AirdropSession::new();
        let text: Vec<&str> = addresses.iter().map(|a| a.as_str()).collect();
        session.add_text(&text.join("\n"));
        session.select_asset(SelectedAsset::lovelace(balance));
        session.set_amount(amount);

        let mut runner = AirdropRunner::new(&wallet, &NoBlacklist, NotificationLog::default())
            .with_retry(RetryPolicy::none());
        let report = tokio_test::block_on(runner.run(&session)).unwrap();
        prop_assert_eq!(&report.final_state, &RunState::Completed);

        let batch_size = report.plan.unwrap().batch_size;
        let batches = tokio_test::block_on(wallet.submitted_batches());
        prop_assert_eq!(batches.len(), n.div_ceil(batch_size));
        prop_assert!(batches.iter().all(|b| b.len() <= batch_size));

        let paid: Vec<RecipientAddress> = batches.into_iter().flatten().map(|o| o.address).collect();
        prop_assert_eq!(paid, addresses);
    }
}
