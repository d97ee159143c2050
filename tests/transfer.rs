//! Token transfer tests against a scripted wallet.

use alloy::primitives::{Address, U256};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use uzh_wallet::blockchain::units::AmountError;
use uzh_wallet::config::TokenConfig;
use uzh_wallet::connector::NetworkDescriptor;
use uzh_wallet::provider::ProviderError;
use uzh_wallet::transfer::confirm::ConfirmationPolicy;
use uzh_wallet::{
    ConnectionState, TransferError, TransferExecutor, TransferRequest, TransferSettings,
    WalletConnector,
};

mod common;
use common::{MockProvider, ACCOUNT, AUTHORIZED_SENDER, JOHN_DOE};

struct Harness {
    mock: Arc<MockProvider>,
    executor: TransferExecutor,
    state: ConnectionState,
}

async fn connected_as(account: Address) -> Harness {
    let mock = MockProvider::with(|s| s.accounts = vec![account]);
    let connector = WalletConnector::new(Some(mock.as_provider()), NetworkDescriptor::default());
    let state = connector.connect().await.unwrap();

    let mut settings = TransferSettings::from(&TokenConfig::default());
    settings.confirmation = ConfirmationPolicy {
        timeout: Duration::from_millis(300),
        base_interval_ms: 5,
        max_interval_ms: 20,
    };

    Harness {
        mock,
        executor: TransferExecutor::new(connector, settings),
        state,
    }
}

#[tokio::test]
async fn test_refused_when_not_connected() {
    let mock = MockProvider::new();
    let connector = WalletConnector::new(Some(mock.as_provider()), NetworkDescriptor::default());
    let executor = TransferExecutor::new(connector, TransferSettings::from(&TokenConfig::default()));

    let request = TransferRequest::new("john doe", "1");
    let request_id = request.id;
    let result = executor.submit(request, &ConnectionState::disconnected()).await;

    assert_eq!(result.request_id(), request_id);
    assert_eq!(result.error(), Some(&TransferError::NotConnected));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_amounts_are_refused_locally() {
    let h = connected_as(AUTHORIZED_SENDER).await;
    let cases = [
        ("", AmountError::Empty),
        ("0", AmountError::NotPositive),
        ("0.000", AmountError::NotPositive),
        ("-1", AmountError::Malformed("-1".to_string())),
        ("1e18", AmountError::Malformed("1e18".to_string())),
        ("0.0000000000000000001", AmountError::TooPrecise(18)),
    ];

    for (amount, expected) in cases {
        let result = h.executor.submit(TransferRequest::new("john doe", amount), &h.state).await;
        assert_eq!(
            result.error(),
            Some(&TransferError::InvalidAmount(expected)),
            "amount {:?}",
            amount
        );
    }
    assert_eq!(h.mock.count("eth_gasPrice"), 0);
    assert_eq!(h.mock.count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn test_only_authorized_sender_may_send() {
    let h = connected_as(ACCOUNT).await;
    let result = h.executor.submit(TransferRequest::new("john doe", "1"), &h.state).await;

    assert_eq!(
        result.error(),
        Some(&TransferError::WrongAccount {
            expected: AUTHORIZED_SENDER,
            actual: ACCOUNT,
        })
    );
    let reason = result.failure_reason().unwrap();
    assert!(reason.contains("0x284edb1ab6010422503c4190beb08dbaa6bb7ea5"));
    assert_eq!(h.mock.count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn test_unknown_recipient() {
    let h = connected_as(AUTHORIZED_SENDER).await;

    for recipient in ["nobody", "0x1234", ""] {
        let result = h.executor.submit(TransferRequest::new(recipient, "1"), &h.state).await;
        assert!(
            matches!(result.error(), Some(TransferError::InvalidRecipient(_))),
            "recipient {:?}",
            recipient
        );
    }
    assert_eq!(h.mock.count("eth_sendTransaction"), 0);
}

#[tokio::test]
async fn test_successful_transfer_sends_once() {
    let h = connected_as(AUTHORIZED_SENDER).await;
    let request = TransferRequest::new("John Doe", "1.5").with_message("for lunch");
    let result = h.executor.submit(request, &h.state).await;

    assert!(result.is_success(), "{:?}", result.failure_reason());
    let uzh_wallet::TransferResult::Submitted { receipt, .. } = &result else {
        unreachable!()
    };
    assert_eq!(receipt.from, AUTHORIZED_SENDER);
    assert_eq!(receipt.to, JOHN_DOE);
    assert_eq!(receipt.amount_base_units, U256::from(1_500_000_000_000_000_000u64));
    assert_eq!(receipt.block_number, Some(16));
    assert!(receipt.confirmed);
    assert!(result.is_confirmed());
    assert_eq!(result.transaction_id(), Some(receipt.transaction_id));

    let sent = h.mock.sent();
    assert_eq!(sent.len(), 1);
    let tx = &sent[0];
    let contract: Address = serde_json::from_value(tx["to"].clone()).unwrap();
    let from: Address = serde_json::from_value(tx["from"].clone()).unwrap();
    assert_eq!(contract, TokenConfig::default().contract_address);
    assert_eq!(from, AUTHORIZED_SENDER);
    assert_eq!(tx["gasPrice"], json!("0x4a817c800"));

    let data = tx["data"].as_str().unwrap();
    assert!(data.starts_with("0xa9059cbb"));
    assert!(data.contains("75ce93e8a7a73cf688b4c0b12b11bbbc96417995"));
    assert!(!data.contains("for lunch"));

    let banner = result.success_message("UZHETHw").unwrap();
    assert!(banner.starts_with("Successfully sent 1.5 UZHETHw with message: for lunch"));
}

#[tokio::test]
async fn test_rejected_send_is_not_retried() {
    let h = connected_as(AUTHORIZED_SENDER).await;
    h.mock.set(|s| s.send_error = Some(ProviderError::user_rejected()));

    let result = h.executor.submit(TransferRequest::new("store", "2"), &h.state).await;
    let reason = result.failure_reason().unwrap();
    assert!(matches!(result.error(), Some(TransferError::TransferFailed(_))));
    assert!(reason.contains("User rejected"));
    assert_eq!(h.mock.count("eth_sendTransaction"), 1);
    assert_eq!(h.mock.count("eth_getTransactionReceipt"), 0);
}

#[tokio::test]
async fn test_reverted_transaction_fails() {
    let h = connected_as(AUTHORIZED_SENDER).await;
    h.mock.set(|s| s.receipt = json!({ "status": "0x0", "blockNumber": "0x11" }));

    let result = h.executor.submit(TransferRequest::new("store", "1"), &h.state).await;
    assert!(result.failure_reason().unwrap().contains("reverted"));
    assert_eq!(h.mock.count("eth_sendTransaction"), 1);
}

#[tokio::test]
async fn test_unconfirmed_transaction_keeps_its_hash() {
    let h = connected_as(AUTHORIZED_SENDER).await;
    h.mock.set(|s| s.receipt = serde_json::Value::Null);

    let result = h.executor.submit(TransferRequest::new("store", "1"), &h.state).await;
    assert!(result.is_success());
    assert!(!result.is_confirmed());
    assert_eq!(result.error(), None);

    let uzh_wallet::TransferResult::Submitted { receipt, .. } = &result else {
        unreachable!()
    };
    assert!(!receipt.confirmed);
    assert_eq!(receipt.block_number, None);
    assert_eq!(result.transaction_id(), Some(receipt.transaction_id));
    assert!(result.success_message("UZHETHw").unwrap().contains("not yet confirmed"));

    assert_eq!(h.mock.count("eth_sendTransaction"), 1);
    assert!(h.mock.count("eth_getTransactionReceipt") >= 1);
}

#[tokio::test]
async fn test_receipt_amount_is_canonical() {
    let h = connected_as(AUTHORIZED_SENDER).await;
    let result = h.executor.submit(TransferRequest::new("store", "01.500"), &h.state).await;

    let uzh_wallet::TransferResult::Submitted { receipt, .. } = &result else {
        panic!("transfer failed: {:?}", result.failure_reason())
    };
    assert_eq!(receipt.amount_tokens, "1.5");
    assert!(result.success_message("UZHETHw").unwrap().starts_with("Successfully sent 1.5 UZHETHw"));
}

#[tokio::test]
async fn test_concurrent_submissions_each_send_once() {
    let h = connected_as(AUTHORIZED_SENDER).await;

    let (a, b) = tokio::join!(
        h.executor.submit(TransferRequest::new("store", "1"), &h.state),
        h.executor.submit(TransferRequest::new("john doe", "2"), &h.state),
    );

    assert!(a.is_success() && b.is_success());
    assert_ne!(a.request_id(), b.request_id());
    assert_ne!(a.transaction_id(), b.transaction_id());
    assert_eq!(h.mock.count("eth_sendTransaction"), 2);
}
