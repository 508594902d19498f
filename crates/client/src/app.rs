//! View-model tying the wallet, registry, session and orchestrator together.
//!
//! Handlers never return errors: every failure ends up as a message on the
//! trade session, and a successful action refreshes the registry.

use std::sync::Arc;

use ethers::types::Address;
use tracing::warn;

use crate::amount::{curve_preview, CurvePoint};
use crate::chain::ChainClient;
use crate::config::NetworkConfig;
use crate::error::ChainError;
use crate::orchestrator::{ActionOrchestrator, ActionRun};
use crate::registry::{LaunchedToken, TokenRegistryView};
use crate::session::{LaunchForm, TradeDirection, TradeSession, WalletSession};

pub const CONNECT_WALLET: &str = "Please connect your wallet.";
pub const SELECT_TOKEN_AND_AMOUNT: &str = "Please connect, select a token, and enter an amount.";
pub const SELECT_TOKEN: &str = "Please connect and select a token.";
pub const ALREADY_GRADUATED: &str = "Token has already graduated.";

pub const LAUNCH_SUCCEEDED: &str = "Token launched successfully!";
pub const BUY_SUCCEEDED: &str = "Buy successful!";
pub const SELL_SUCCEEDED: &str = "Sell successful!";
pub const GRADUATE_SUCCEEDED: &str = "Token graduated!";

pub const LAUNCH_FAILED: &str = "Failed to launch token.";
pub const BUY_FAILED: &str = "Failed to buy token.";
pub const SELL_FAILED: &str = "Failed to sell token.";
pub const GRADUATE_FAILED: &str = "Failed to graduate token. Market cap might not be met.";
pub const FETCH_FAILED: &str = "Failed to fetch tokens.";

pub struct LaunchpadApp<C> {
    client: Arc<C>,
    wallet: WalletSession,
    registry: TokenRegistryView<C>,
    orchestrator: ActionOrchestrator<C>,
    pub session: TradeSession,
    pub launch_form: LaunchForm,
    last_run: Option<ActionRun>,
}

impl<C: ChainClient> LaunchpadApp<C> {
    pub fn new(client: Arc<C>, config: NetworkConfig) -> Self {
        let registry = TokenRegistryView::new(Arc::clone(&client), config.contracts.token_factory);
        let orchestrator = ActionOrchestrator::new(Arc::clone(&client), config);
        Self {
            client,
            wallet: WalletSession::default(),
            registry,
            orchestrator,
            session: TradeSession::default(),
            launch_form: LaunchForm::default(),
            last_run: None,
        }
    }

    pub fn wallet(&self) -> &WalletSession {
        &self.wallet
    }

    pub fn tokens(&self) -> &[LaunchedToken] {
        self.registry.tokens()
    }

    pub fn registry(&self) -> &TokenRegistryView<C> {
        &self.registry
    }

    /// The last action the app ran, with its full state history.
    pub fn last_run(&self) -> Option<&ActionRun> {
        self.last_run.as_ref()
    }

    /// Connect the client's signer and load the token list.
    pub async fn connect(&mut self) -> bool {
        match self.client.signer() {
            Some(account) => {
                self.wallet.connect(account);
                self.fetch_tokens().await;
                true
            }
            None => {
                self.session.fail(CONNECT_WALLET);
                false
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.wallet.disconnect();
        self.session.clear_selection();
    }

    pub async fn fetch_tokens(&mut self) {
        self.session.set_loading(true);
        self.refresh_registry().await;
        self.session.set_loading(false);
    }

    async fn refresh_registry(&mut self) {
        if let Err(error) = self.registry.refresh().await {
            warn!(error = %error, "token list unavailable");
            self.session.fail(FETCH_FAILED);
        }
    }

    pub fn select_token(&mut self, token: Address) {
        self.session.select(token);
    }

    pub fn selected_token(&self) -> Option<&LaunchedToken> {
        self.session.selected_token(self.registry.tokens())
    }

    /// Simulated price chart for the selected token.
    pub fn curve_preview(&self) -> Vec<CurvePoint> {
        match self.selected_token() {
            Some(_) => curve_preview(),
            None => Vec::new(),
        }
    }

    pub async fn handle_launch(&mut self) {
        if !self.wallet.is_connected() {
            self.session.fail(CONNECT_WALLET);
            return;
        }
        self.session.begin();
        let request = match self.launch_form.validate() {
            Ok(request) => request,
            Err(error) => {
                self.session.fail(error.to_string());
                return;
            }
        };
        let run = self.orchestrator.launch(&request).await;
        if run.is_done() {
            self.launch_form.reset();
        }
        self.finish(run, LAUNCH_SUCCEEDED, LAUNCH_FAILED).await;
    }

    pub async fn handle_buy(&mut self) {
        self.handle_trade(TradeDirection::Buy).await
    }

    pub async fn handle_sell(&mut self) {
        self.handle_trade(TradeDirection::Sell).await
    }

    async fn handle_trade(&mut self, direction: TradeDirection) {
        let (succeeded, failed) = match direction {
            TradeDirection::Buy => (BUY_SUCCEEDED, BUY_FAILED),
            TradeDirection::Sell => (SELL_SUCCEEDED, SELL_FAILED),
        };
        let token = match self.selected_token() {
            Some(token) if self.wallet.is_connected() && self.session.has_trade_amount() => {
                token.clone()
            }
            _ => {
                self.session.fail(SELECT_TOKEN_AND_AMOUNT);
                return;
            }
        };
        self.session.begin();
        let intent = match self.session.trade_intent(&token, direction) {
            Ok(intent) => intent,
            Err(error) => {
                warn!(error = %error, "invalid trade amount");
                self.session.fail(failed);
                return;
            }
        };
        let run = self.orchestrator.trade(&token, &intent).await;
        self.finish(run, succeeded, failed).await;
    }

    pub async fn handle_graduate(&mut self) {
        let token = match self.selected_token() {
            Some(token) if self.wallet.is_connected() => token.clone(),
            _ => {
                self.session.fail(SELECT_TOKEN);
                return;
            }
        };
        self.session.begin();
        let run = self.orchestrator.graduate(&token).await;
        let failed = match run.error() {
            Some(ChainError::Validation(_)) => ALREADY_GRADUATED,
            _ => GRADUATE_FAILED,
        };
        self.finish(run, GRADUATE_SUCCEEDED, failed).await;
    }

    async fn finish(&mut self, run: ActionRun, succeeded: &str, failed: &str) {
        if run.is_done() {
            self.refresh_registry().await;
            self.session.succeed(succeeded);
        } else {
            if let Some(error) = run.error() {
                warn!(kind = ?run.kind, error = %error, "{failed}");
            }
            self.session.fail(failed);
        }
        self.last_run = Some(run);
    }
}
