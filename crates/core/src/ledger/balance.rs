//! Balance derivation from the operation log.

use rust_decimal::Decimal;
use schoolmoney_shared::types::BankAccountId;

use super::types::BankOperation;

/// Incoming minus outgoing for `account` over `ops`. No rows yields zero.
#[must_use]
pub fn balance_from_log<'a, I>(account: BankAccountId, ops: I) -> Decimal
where
    I: IntoIterator<Item = &'a BankOperation>,
{
    ops.into_iter().map(|op| op.effect_on(account)).sum()
}

/// Incoming and outgoing totals for `account`.
#[must_use]
pub fn flow_totals<'a, I>(account: BankAccountId, ops: I) -> (Decimal, Decimal)
where
    I: IntoIterator<Item = &'a BankOperation>,
{
    ops.into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(incoming, outgoing), op| {
            let incoming = if op.destination_account_id == Some(account) {
                incoming + op.amount
            } else {
                incoming
            };
            let outgoing = if op.source_account_id == Some(account) {
                outgoing + op.amount
            } else {
                outgoing
            };
            (incoming, outgoing)
        })
}
