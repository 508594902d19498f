//! Devnet fixtures shared by the async tests.

use ethers::abi::Token;
use ethers::types::{Address, U256};

use crate::abi;
use crate::chain::ChainClient;
use crate::config::NetworkConfig;
use crate::devnet::{Devnet, JournalEntry};
use crate::registry::LaunchedToken;

pub const DEPLOYER: Address = Address::repeat_byte(0x01);
pub const ALICE: Address = Address::repeat_byte(0x0a);
pub const BOB: Address = Address::repeat_byte(0x0b);

pub fn ether(n: u64) -> U256 {
    U256::exp10(18) * n
}

/// `n` thousandths of a native unit.
pub fn milli(n: u64) -> U256 {
    U256::exp10(15) * n
}

/// Fresh devnet with the launchpad deployed by [`DEPLOYER`]; the returned
/// handle signs as [`ALICE`].
pub async fn chain() -> (Devnet, NetworkConfig) {
    let devnet = Devnet::new();
    for account in [DEPLOYER, ALICE, BOB] {
        devnet.fund(account, ether(100));
    }
    let (config, _) = devnet.connect(DEPLOYER).bootstrap().await.unwrap();
    (devnet.connect(ALICE), config)
}

#[derive(Debug, Clone, Copy)]
pub struct Launched {
    pub token: Address,
    pub curve: Address,
}

impl Launched {
    /// Registry entry as a fresh fetch would report it.
    pub fn listed(&self, name: &str, symbol: &str) -> LaunchedToken {
        LaunchedToken {
            address: self.token,
            name: name.into(),
            symbol: symbol.into(),
            curve_address: self.curve,
            is_graduated: false,
            market_cap: U256::zero(),
        }
    }
}

/// Launch a token paying the fee as transaction value.
pub async fn launch(
    devnet: &Devnet,
    config: &NetworkConfig,
    name: &str,
    symbol: &str,
    graduation_market_cap: U256,
) -> Launched {
    let factory = config.contracts.token_factory;
    let launch = abi::function(abi::factory(), abi::LAUNCH_NEW_TOKEN).unwrap();
    let args = [
        Token::String(name.into()),
        Token::String(symbol.into()),
        Token::String("https://example.com/metadata.json".into()),
        Token::Uint(graduation_market_cap),
    ];
    let tx = devnet
        .send_transaction(factory, launch, &args, Some(config.launch_fee))
        .await
        .unwrap();
    devnet.await_confirmation(&tx).await.unwrap();

    let token = devnet.with_state(|state| {
        *state
            .factory(factory)
            .unwrap()
            .launched_tokens()
            .last()
            .unwrap()
    });
    let curve = devnet.token_info(factory, token).unwrap().curve;
    Launched { token, curve }
}

/// Buy from `curve` for `amount` native units.
pub async fn buy(devnet: &Devnet, curve: Address, amount: U256) {
    let buy = abi::function(abi::curve(), abi::BUY).unwrap();
    let tx = devnet
        .send_transaction(curve, buy, &[], Some(amount))
        .await
        .unwrap();
    devnet.await_confirmation(&tx).await.unwrap();
}

/// Index of the first journal entry of `kind` ("sent", "confirmed",
/// "reverted") for `method`.
pub fn journal_index(journal: &[JournalEntry], kind: &str, method: &str) -> Option<usize> {
    journal.iter().position(|entry| {
        let matches_kind = matches!(
            (kind, entry),
            ("sent", JournalEntry::Sent { .. })
                | ("confirmed", JournalEntry::Confirmed { .. })
                | ("reverted", JournalEntry::Reverted { .. })
        );
        matches_kind && entry.method() == method
    })
}
