//! Supplier wallets.
//!
//! `wallets.balance` is a running total kept in step with the append-only
//! `wallet_transactions` ledger: every balance change is paired with exactly one ledger row
//! in the same transaction, and balances are only ever moved with single-statement
//! increments (and a floor check on debits).

use crate::{
    core::{
        access::{Principal, require_supplier_profile},
        ids::new_id,
    },
    entities::{
        LedgerKind, OrderItem, Product, Wallet, WalletTransaction, WithdrawalStatus, order,
        order_item, wallet, wallet_transaction, withdrawal,
    },
    errors::{Error, Result},
};
use sea_orm::{
    ConnectionTrait, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Ledger entries returned with a wallet summary.
const RECENT_TRANSACTIONS: u64 = 20;

/// Ledger reference for the delivery credit of one supplier's share of an order.
#[must_use]
pub fn delivery_reference(order_id: &str, supplier_id: &str) -> String {
    format!("order:{order_id}:supplier:{supplier_id}")
}

/// Returns the supplier's wallet, creating an empty one on first use.
pub async fn get_or_create_wallet<C: ConnectionTrait>(
    db: &C,
    supplier_id: &str,
) -> Result<wallet::Model> {
    if let Some(existing) = Wallet::find()
        .filter(wallet::Column::SupplierId.eq(supplier_id))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let now = chrono::Utc::now();
    let created = wallet::ActiveModel {
        id: Set(new_id()),
        supplier_id: Set(supplier_id.to_string()),
        balance: Set(0.0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(created)
}

/// One supplier's credit for a delivered order.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryCredit {
    pub supplier_id: String,
    pub amount: f64,
}

/// Subtotal of the order's items per supplier profile.
async fn supplier_subtotals<C: ConnectionTrait>(
    db: &C,
    order_id: &str,
) -> Result<BTreeMap<String, f64>> {
    let rows = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .find_also_related(Product)
        .all(db)
        .await?;

    let mut subtotals = BTreeMap::new();
    for (item, product) in rows {
        let Some(product) = product else {
            warn!(order = %order_id, product = %item.product_id, "Order item without product, skipping credit");
            continue;
        };
        *subtotals.entry(product.supplier_id).or_insert(0.0) += item.subtotal();
    }
    Ok(subtotals)
}

/// Credits every supplier of a delivered order with the subtotal of their own items.
///
/// Each (order, supplier) pair is credited at most once: the ledger reference is unique,
/// a pre-check skips pairs already credited, and losing an insert race to another caller
/// is treated as already credited. Returns the credits applied by this call.
pub async fn credit_order_delivery(
    db: &DatabaseConnection,
    order: &order::Model,
) -> Result<Vec<DeliveryCredit>> {
    let mut applied = Vec::new();

    for (supplier_id, amount) in supplier_subtotals(db, &order.id).await? {
        let reference = delivery_reference(&order.id, &supplier_id);
        let already = WalletTransaction::find()
            .filter(wallet_transaction::Column::Reference.eq(reference.as_str()))
            .one(db)
            .await?;
        if already.is_some() {
            continue;
        }

        let txn = db.begin().await?;
        let wallet = get_or_create_wallet(&txn, &supplier_id).await?;
        let entry = wallet_transaction::ActiveModel {
            id: Set(new_id()),
            wallet_id: Set(wallet.id.clone()),
            amount: Set(amount),
            kind: Set(LedgerKind::Credit),
            reference: Set(reference),
            description: Set(format!("Delivery of order {}", order.tracking_id)),
            created_at: Set(chrono::Utc::now()),
        };
        match entry.insert(&txn).await {
            Ok(_) => {}
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                warn!(order = %order.id, supplier = %supplier_id, "Delivery already credited");
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        Wallet::update_many()
            .col_expr(
                wallet::Column::Balance,
                Expr::col(wallet::Column::Balance).add(amount),
            )
            .col_expr(wallet::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
            .filter(wallet::Column::Id.eq(wallet.id.as_str()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        info!(order = %order.id, supplier = %supplier_id, amount, "Wallet credited");
        applied.push(DeliveryCredit {
            supplier_id,
            amount,
        });
    }

    Ok(applied)
}

/// A supplier's wallet with its most recent ledger entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub wallet: wallet::Model,
    pub transactions: Vec<wallet_transaction::Model>,
}

/// Wallet of the calling supplier.
pub async fn get_wallet_summary(
    db: &DatabaseConnection,
    principal: &Principal,
) -> Result<WalletSummary> {
    let supplier = require_supplier_profile(db, principal).await?;
    let wallet = get_or_create_wallet(db, &supplier.id).await?;
    let transactions = WalletTransaction::find()
        .filter(wallet_transaction::Column::WalletId.eq(wallet.id.as_str()))
        .order_by_desc(wallet_transaction::Column::CreatedAt)
        .limit(RECENT_TRANSACTIONS)
        .all(db)
        .await?;
    Ok(WalletSummary {
        wallet,
        transactions,
    })
}

/// `POST /wallet/withdrawals` request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub amount: f64,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

/// Debits the caller's wallet and records a pending payout.
///
/// # Errors
/// - `Validation` for a non-positive amount or missing bank details
/// - `Forbidden` if the caller has no supplier profile
/// - `InsufficientFunds` if the balance does not cover the amount
#[instrument(skip(db, request), fields(user = %principal.id, amount = request.amount))]
pub async fn request_withdrawal(
    db: &DatabaseConnection,
    principal: &Principal,
    request: WithdrawalRequest,
) -> Result<withdrawal::Model> {
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(Error::validation("Withdrawal amount must be positive"));
    }
    for (field, value) in [
        ("bankName", &request.bank_name),
        ("accountNumber", &request.account_number),
        ("accountName", &request.account_name),
    ] {
        if value.trim().is_empty() {
            return Err(Error::validation(format!("{field} is required")));
        }
    }

    let supplier = require_supplier_profile(db, principal).await?;
    let txn = db.begin().await?;
    let wallet = get_or_create_wallet(&txn, &supplier.id).await?;

    let debited = Wallet::update_many()
        .col_expr(
            wallet::Column::Balance,
            Expr::col(wallet::Column::Balance).sub(request.amount),
        )
        .col_expr(wallet::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(wallet::Column::Id.eq(wallet.id.as_str()))
        .filter(wallet::Column::Balance.gte(request.amount))
        .exec(&txn)
        .await?;
    if debited.rows_affected == 0 {
        let balance = Wallet::find_by_id(wallet.id.clone())
            .one(&txn)
            .await?
            .map_or(0.0, |w| w.balance);
        return Err(Error::InsufficientFunds {
            balance,
            requested: request.amount,
        });
    }

    let withdrawal_id = new_id();
    let now = chrono::Utc::now();
    wallet_transaction::ActiveModel {
        id: Set(new_id()),
        wallet_id: Set(wallet.id.clone()),
        amount: Set(request.amount),
        kind: Set(LedgerKind::Debit),
        reference: Set(format!("withdrawal:{withdrawal_id}")),
        description: Set(format!("Withdrawal to {}", request.bank_name.trim())),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let created = withdrawal::ActiveModel {
        id: Set(withdrawal_id),
        wallet_id: Set(wallet.id),
        amount: Set(request.amount),
        status: Set(WithdrawalStatus::Pending),
        bank_name: Set(request.bank_name.trim().to_string()),
        account_number: Set(request.account_number.trim().to_string()),
        account_name: Set(request.account_name.trim().to_string()),
        created_at: Set(now),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(withdrawal = %created.id, "Withdrawal requested");
    Ok(created)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{entities::Role, test_utils::*};

    fn withdrawal(amount: f64) -> WithdrawalRequest {
        WithdrawalRequest {
            amount,
            bank_name: "First Bank".to_string(),
            account_number: "0123456789".to_string(),
            account_name: "Prime Parts Ltd".to_string(),
        }
    }

    #[tokio::test]
    async fn test_delivery_credit_is_idempotent() -> Result<()> {
        let market = setup_marketplace().await?;
        let order = place_test_order(&market, &market.product.id, 3).await?;

        let first = credit_order_delivery(&market.db, &order).await?;
        assert_eq!(
            first,
            vec![DeliveryCredit {
                supplier_id: market.supplier.id.clone(),
                amount: 3000.0,
            }]
        );

        let second = credit_order_delivery(&market.db, &order).await?;
        assert!(second.is_empty());

        let summary = get_wallet_summary(&market.db, &market.supplier_principal()).await?;
        assert_eq!(summary.wallet.balance, 3000.0);
        assert_eq!(summary.transactions.len(), 1);
        assert_eq!(
            summary.transactions[0].reference,
            delivery_reference(&order.id, &market.supplier.id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_multi_supplier_order_splits_credit() -> Result<()> {
        let market = setup_marketplace().await?;
        let (other_user, other_profile, other_product) =
            create_test_supplier_with_product(&market.db, "Second Parts", 4000.0, 10).await?;
        let order = place_test_order_lines(
            &market,
            vec![(market.product.id.clone(), 2), (other_product.id.clone(), 1)],
        )
        .await?;

        let credits = credit_order_delivery(&market.db, &order).await?;
        assert_eq!(credits.len(), 2);

        let mine = get_wallet_summary(&market.db, &market.supplier_principal()).await?;
        assert_eq!(mine.wallet.balance, 2000.0);

        let theirs = get_wallet_summary(&market.db, &Principal::new(other_user.id, Role::Supplier))
            .await?;
        assert_eq!(theirs.wallet.supplier_id, other_profile.id);
        assert_eq!(theirs.wallet.balance, 4000.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_withdrawal_debits_balance() -> Result<()> {
        let market = setup_marketplace().await?;
        let supplier = market.supplier_principal();
        let order = place_test_order(&market, &market.product.id, 2).await?;
        credit_order_delivery(&market.db, &order).await?;

        let created = request_withdrawal(&market.db, &supplier, withdrawal(1500.0)).await?;
        assert_eq!(created.status, WithdrawalStatus::Pending);

        let summary = get_wallet_summary(&market.db, &supplier).await?;
        assert_eq!(summary.wallet.balance, 500.0);
        assert_eq!(summary.transactions.len(), 2);

        let result = request_withdrawal(&market.db, &supplier, withdrawal(600.0)).await;
        match result {
            Err(Error::InsufficientFunds { balance, requested }) => {
                assert_eq!(balance, 500.0);
                assert_eq!(requested, 600.0);
            }
            other => panic!("expected insufficient funds, got {other:?}"),
        }
        let summary = get_wallet_summary(&market.db, &supplier).await?;
        assert_eq!(summary.wallet.balance, 500.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_withdrawal_validation() -> Result<()> {
        let market = setup_marketplace().await?;

        let result = request_withdrawal(&market.db, &market.supplier_principal(), withdrawal(0.0)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let mut missing_bank = withdrawal(10.0);
        missing_bank.bank_name = " ".to_string();
        let result = request_withdrawal(&market.db, &market.supplier_principal(), missing_bank).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = request_withdrawal(&market.db, &market.buyer_principal(), withdrawal(10.0)).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }
}
