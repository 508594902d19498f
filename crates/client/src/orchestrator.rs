//! Multi-step chain actions as explicit state machines.
//!
//! Each action records every state it passes through. A step that needs a
//! prior approval never submits before the approval's confirmation has been
//! observed, and any failure ends the run without issuing further calls.

use std::sync::Arc;

use ethers::abi::{Function, Token};
use ethers::types::{Address, U256};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::abi;
use crate::amount::format_native;
use crate::chain::{ChainClient, Receipt, TxHandle};
use crate::config::NetworkConfig;
use crate::error::ChainError;
use crate::registry::LaunchedToken;
use crate::session::{LaunchRequest, TradeDirection, TradeIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    Launch,
    Buy,
    Sell,
    Graduate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionState {
    Idle,
    Approving { amount: U256 },
    AwaitingApprovalConfirm(TxHandle),
    Submitting,
    AwaitingSubmitConfirm(TxHandle),
    Done(Receipt),
    Failed(ChainError),
}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionState::Done(_) | ActionState::Failed(_))
    }
}

/// One execution of an action and the states it went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRun {
    pub kind: ActionKind,
    state: ActionState,
    history: Vec<ActionState>,
}

impl ActionRun {
    fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            state: ActionState::Idle,
            history: Vec::new(),
        }
    }

    fn advance(&mut self, next: ActionState) {
        debug!(kind = ?self.kind, from = ?self.state, to = ?next, "action transition");
        let previous = std::mem::replace(&mut self.state, next);
        self.history.push(previous);
    }

    fn finish(mut self, outcome: Result<Receipt, ChainError>) -> Self {
        match outcome {
            Ok(receipt) => {
                info!(kind = ?self.kind, tx = ?receipt.tx_hash, "action done");
                self.advance(ActionState::Done(receipt));
            }
            Err(error) => {
                warn!(kind = ?self.kind, error = %error, "action failed");
                self.advance(ActionState::Failed(error));
            }
        }
        self
    }

    pub fn state(&self) -> &ActionState {
        &self.state
    }

    /// States before the current one, starting with `Idle`.
    pub fn history(&self) -> &[ActionState] {
        &self.history
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ActionState::Done(_))
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        match &self.state {
            ActionState::Done(receipt) => Some(receipt),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ChainError> {
        match &self.state {
            ActionState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Receipt, ChainError> {
        match self.state {
            ActionState::Done(receipt) => Ok(receipt),
            ActionState::Failed(error) => Err(error),
            other => Err(ChainError::Decode(format!("action stopped in {other:?}"))),
        }
    }
}

pub struct ActionOrchestrator<C> {
    client: Arc<C>,
    config: NetworkConfig,
}

impl<C: ChainClient> ActionOrchestrator<C> {
    pub fn new(client: Arc<C>, config: NetworkConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Approve the launch fee on the wrapped native token, then launch.
    #[instrument(skip(self, request), fields(name = %request.name, symbol = %request.symbol))]
    pub async fn launch(&self, request: &LaunchRequest) -> ActionRun {
        let mut run = ActionRun::new(ActionKind::Launch);
        let outcome = self.run_launch(&mut run, request).await;
        run.finish(outcome)
    }

    async fn run_launch(
        &self,
        run: &mut ActionRun,
        request: &LaunchRequest,
    ) -> Result<Receipt, ChainError> {
        let (fee, approval) = (self.config.launch_fee, self.config.launch_approval);
        if approval < fee {
            return Err(ChainError::validation(format!(
                "launch approval {} is below the launch fee {}",
                format_native(approval),
                format_native(fee)
            )));
        }
        let factory = self.config.contracts.token_factory;

        let approve = abi::function(abi::token(), abi::APPROVE)?;
        let args = [Token::Address(factory), Token::Uint(approval)];
        self.approve(run, self.config.contracts.wrapped_native, approve, &args, approval)
            .await?;

        let launch = abi::function(abi::factory(), abi::LAUNCH_NEW_TOKEN)?;
        let args = [
            Token::String(request.name.clone()),
            Token::String(request.symbol.clone()),
            Token::String(request.uri.clone()),
            Token::Uint(request.graduation_market_cap),
        ];
        self.submit(run, factory, launch, &args, None).await
    }

    /// Buy or sell according to `intent`.
    pub async fn trade(&self, token: &LaunchedToken, intent: &TradeIntent) -> ActionRun {
        match intent.direction {
            TradeDirection::Buy => self.buy(token, intent.amount).await,
            TradeDirection::Sell => self.sell(token, intent.amount).await,
        }
    }

    /// Spend `amount` native units on the token's curve.
    #[instrument(skip(self, token), fields(token = ?token.address))]
    pub async fn buy(&self, token: &LaunchedToken, amount: U256) -> ActionRun {
        let mut run = ActionRun::new(ActionKind::Buy);
        let outcome = self.run_buy(&mut run, token, amount).await;
        run.finish(outcome)
    }

    async fn run_buy(
        &self,
        run: &mut ActionRun,
        token: &LaunchedToken,
        amount: U256,
    ) -> Result<Receipt, ChainError> {
        require_trading(token)?;
        let buy = abi::function(abi::curve(), abi::BUY)?;
        self.submit(run, token.curve_address, buy, &[], Some(amount))
            .await
    }

    /// Approve the curve for `amount` tokens, then sell them.
    #[instrument(skip(self, token), fields(token = ?token.address))]
    pub async fn sell(&self, token: &LaunchedToken, amount: U256) -> ActionRun {
        let mut run = ActionRun::new(ActionKind::Sell);
        let outcome = self.run_sell(&mut run, token, amount).await;
        run.finish(outcome)
    }

    async fn run_sell(
        &self,
        run: &mut ActionRun,
        token: &LaunchedToken,
        amount: U256,
    ) -> Result<Receipt, ChainError> {
        require_trading(token)?;
        let approve = abi::function(abi::token(), abi::APPROVE)?;
        let args = [Token::Address(token.curve_address), Token::Uint(amount)];
        self.approve(run, token.address, approve, &args, amount)
            .await?;

        let sell = abi::function(abi::curve(), abi::SELL)?;
        self.submit(run, token.curve_address, sell, &[Token::Uint(amount)], None)
            .await
    }

    /// Move the curve's liquidity to the DEX. Not submitted for a token
    /// already known to be graduated.
    #[instrument(skip(self, token), fields(token = ?token.address))]
    pub async fn graduate(&self, token: &LaunchedToken) -> ActionRun {
        let mut run = ActionRun::new(ActionKind::Graduate);
        let outcome = self.run_graduate(&mut run, token).await;
        run.finish(outcome)
    }

    async fn run_graduate(
        &self,
        run: &mut ActionRun,
        token: &LaunchedToken,
    ) -> Result<Receipt, ChainError> {
        if token.is_graduated {
            return Err(ChainError::validation(format!(
                "{} has already graduated",
                token.symbol
            )));
        }
        let graduate = abi::function(abi::curve(), abi::GRADUATE)?;
        let router = self.config.contracts.graduation_router();
        self.submit(run, token.curve_address, graduate, &[Token::Address(router)], None)
            .await
    }

    async fn approve(
        &self,
        run: &mut ActionRun,
        contract: Address,
        approve: &Function,
        args: &[Token],
        amount: U256,
    ) -> Result<Receipt, ChainError> {
        run.advance(ActionState::Approving { amount });
        let tx = self
            .client
            .send_transaction(contract, approve, args, None)
            .await?;
        run.advance(ActionState::AwaitingApprovalConfirm(tx));
        self.client.await_confirmation(&tx).await
    }

    async fn submit(
        &self,
        run: &mut ActionRun,
        contract: Address,
        function: &Function,
        args: &[Token],
        value: Option<U256>,
    ) -> Result<Receipt, ChainError> {
        run.advance(ActionState::Submitting);
        let tx = self
            .client
            .send_transaction(contract, function, args, value)
            .await?;
        run.advance(ActionState::AwaitingSubmitConfirm(tx));
        self.client.await_confirmation(&tx).await
    }
}

/// Trades go to the curve only while it is open, as of the last fetch.
fn require_trading(token: &LaunchedToken) -> Result<(), ChainError> {
    if token.is_graduated {
        return Err(ChainError::validation(format!(
            "{} has graduated; trade it on the DEX",
            token.symbol
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devnet::Devnet;
    use crate::testing::{buy, chain, ether, journal_index, launch, milli, ALICE};

    fn request(graduation_market_cap: U256) -> LaunchRequest {
        LaunchRequest {
            name: "My Token".into(),
            symbol: "MTK".into(),
            uri: "https://example.com/metadata.json".into(),
            graduation_market_cap,
        }
    }

    fn orchestrator(devnet: &Devnet, config: &NetworkConfig) -> ActionOrchestrator<Devnet> {
        ActionOrchestrator::new(Arc::new(devnet.clone()), config.clone())
    }

    fn shape(run: &ActionRun) -> Vec<&'static str> {
        run.history()
            .iter()
            .chain(std::iter::once(run.state()))
            .map(|state| match state {
                ActionState::Idle => "idle",
                ActionState::Approving { .. } => "approving",
                ActionState::AwaitingApprovalConfirm(_) => "awaiting-approval",
                ActionState::Submitting => "submitting",
                ActionState::AwaitingSubmitConfirm(_) => "awaiting-submit",
                ActionState::Done(_) => "done",
                ActionState::Failed(_) => "failed",
            })
            .collect()
    }

    #[tokio::test]
    async fn test_launch_approves_then_launches() {
        let (devnet, config) = chain().await;
        devnet.wrap(config.contracts.wrapped_native, ether(1)).await.unwrap();

        let run = orchestrator(&devnet, &config).launch(&request(ether(1))).await;
        assert!(run.is_done(), "{:?}", run.error());
        assert_eq!(
            shape(&run),
            vec!["idle", "approving", "awaiting-approval", "submitting", "awaiting-submit", "done"]
        );
        assert_eq!(
            run.history()[1],
            ActionState::Approving {
                amount: config.launch_approval
            }
        );

        let journal = devnet.journal();
        let approved = journal_index(&journal, "confirmed", abi::APPROVE).unwrap();
        let launched = journal_index(&journal, "sent", abi::LAUNCH_NEW_TOKEN).unwrap();
        assert!(approved < launched);

        let factory = config.contracts.token_factory;
        let token = devnet.with_state(|state| state.factory(factory).unwrap().launched_tokens()[0]);
        let info = devnet.token_info(factory, token).unwrap();
        assert_eq!(info.name, "My Token");
        assert_eq!(info.symbol, "MTK");
        assert_eq!(info.creator, ALICE);
        assert_eq!(
            devnet.token_balance(config.contracts.wrapped_native, factory).unwrap(),
            config.launch_fee
        );
    }

    #[tokio::test]
    async fn test_launch_rejects_approval_below_fee() {
        let (devnet, mut config) = chain().await;
        config.launch_approval = config.launch_fee - 1;
        let before = devnet.journal().len();

        let run = orchestrator(&devnet, &config).launch(&request(ether(1))).await;
        assert!(matches!(run.error(), Some(ChainError::Validation(_))));
        assert_eq!(shape(&run), vec!["idle", "failed"]);
        assert_eq!(devnet.journal().len(), before);
    }

    #[tokio::test]
    async fn test_launch_stops_when_approval_is_not_confirmed() {
        let (devnet, config) = chain().await;
        devnet.wrap(config.contracts.wrapped_native, ether(1)).await.unwrap();
        devnet.drop_next_confirmation();

        let run = orchestrator(&devnet, &config).launch(&request(ether(1))).await;
        assert!(matches!(run.error(), Some(ChainError::Timeout(_))));
        assert_eq!(shape(&run), vec!["idle", "approving", "awaiting-approval", "failed"]);
        assert!(journal_index(&devnet.journal(), "sent", abi::LAUNCH_NEW_TOKEN).is_none());
    }

    #[tokio::test]
    async fn test_launch_without_wrapped_balance_reverts() {
        let (devnet, config) = chain().await;

        let run = orchestrator(&devnet, &config).launch(&request(ether(1))).await;
        assert_eq!(run.error(), Some(&ChainError::revert("Incorrect launch fee")));
        assert_eq!(
            shape(&run),
            vec!["idle", "approving", "awaiting-approval", "submitting", "failed"]
        );
    }

    #[tokio::test]
    async fn test_buy_attaches_amount_as_value() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;

        let run = orchestrator(&devnet, &config)
            .buy(&launched.listed("My Token", "MTK"), milli(10))
            .await;
        assert_eq!(shape(&run), vec!["idle", "submitting", "awaiting-submit", "done"]);
        assert!(!devnet.token_balance(launched.token, ALICE).unwrap().is_zero());
        assert_eq!(
            devnet.with_state(|state| state.native_balance(launched.curve)),
            milli(10)
        );
    }

    #[tokio::test]
    async fn test_buy_rejected_by_signer() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        devnet.reject_next_signature();

        let run = orchestrator(&devnet, &config)
            .buy(&launched.listed("My Token", "MTK"), milli(10))
            .await;
        assert_eq!(run.error(), Some(&ChainError::UserRejected));
        assert_eq!(shape(&run), vec!["idle", "submitting", "failed"]);
    }

    #[tokio::test]
    async fn test_sell_waits_for_approval_confirmation() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        buy(&devnet, launched.curve, milli(10)).await;
        let held = devnet.token_balance(launched.token, ALICE).unwrap();

        let run = orchestrator(&devnet, &config)
            .sell(&launched.listed("My Token", "MTK"), held)
            .await;
        assert!(run.is_done(), "{:?}", run.error());
        assert_eq!(
            shape(&run),
            vec!["idle", "approving", "awaiting-approval", "submitting", "awaiting-submit", "done"]
        );

        let journal = devnet.journal();
        let approve_sent = journal_index(&journal, "sent", abi::APPROVE).unwrap();
        let approve_confirmed = journal_index(&journal, "confirmed", abi::APPROVE).unwrap();
        let sell_sent = journal_index(&journal, "sent", abi::SELL).unwrap();
        assert!(approve_sent < approve_confirmed);
        assert!(approve_confirmed < sell_sent);
        assert!(devnet.token_balance(launched.token, ALICE).unwrap().is_zero());
    }

    #[tokio::test]
    async fn test_sell_is_not_sent_when_approval_is_rejected() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        buy(&devnet, launched.curve, milli(10)).await;
        devnet.reject_next_signature();

        let run = orchestrator(&devnet, &config)
            .sell(&launched.listed("My Token", "MTK"), milli(1))
            .await;
        assert_eq!(run.error(), Some(&ChainError::UserRejected));
        assert!(journal_index(&devnet.journal(), "sent", abi::SELL).is_none());
    }

    #[tokio::test]
    async fn test_trades_on_graduated_token_are_not_sent() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        let mut token = launched.listed("My Token", "MTK");
        token.is_graduated = true;
        let before = devnet.journal().len();

        let orchestrator = orchestrator(&devnet, &config);
        for run in [
            orchestrator.buy(&token, milli(10)).await,
            orchestrator.sell(&token, milli(10)).await,
            orchestrator.graduate(&token).await,
        ] {
            assert!(matches!(run.error(), Some(ChainError::Validation(_))));
            assert_eq!(shape(&run), vec!["idle", "failed"]);
        }
        assert_eq!(devnet.journal().len(), before);
    }

    #[tokio::test]
    async fn test_graduate_below_threshold_reverts() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", ether(10)).await;
        buy(&devnet, launched.curve, milli(10)).await;

        let run = orchestrator(&devnet, &config)
            .graduate(&launched.listed("My Token", "MTK"))
            .await;
        assert_eq!(run.error(), Some(&ChainError::revert("Market cap not reached")));
    }

    #[tokio::test]
    async fn test_graduate_once_market_cap_is_met() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", milli(50)).await;
        buy(&devnet, launched.curve, milli(100)).await;

        let run = orchestrator(&devnet, &config)
            .graduate(&launched.listed("My Token", "MTK"))
            .await;
        assert!(run.is_done(), "{:?}", run.error());
        assert!(devnet.with_state(|state| state.curve(launched.curve).unwrap().graduated));

        let router = config.contracts.graduation_router();
        let positions = devnet.with_state(|state| state.router(router).unwrap().positions().to_vec());
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].native_amount, milli(100));
    }

    #[tokio::test]
    async fn test_trade_dispatches_on_direction() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        let token = launched.listed("My Token", "MTK");
        let intent = TradeIntent {
            token: token.address,
            curve: token.curve_address,
            amount: milli(5),
            direction: TradeDirection::Buy,
        };

        let run = orchestrator(&devnet, &config).trade(&token, &intent).await;
        assert_eq!(run.kind, ActionKind::Buy);
        assert!(run.into_result().is_ok());
    }
}
