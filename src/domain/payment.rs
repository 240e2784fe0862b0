// ============================================================================
// Payment Domain Model
// ============================================================================

use super::ids::{Currency, PaymentId, PeerId};
use super::order::{OrderKey, Side};
use crate::numeric::{Amount, Price};
use smallvec::SmallVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Intermediate hops between payer and payee, in forwarding order.
pub type Route = SmallVec<[PeerId; 4]>;

/// Value transfer produced by a completed match.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PaymentWire", into = "PaymentWire"))]
pub struct Payment {
    pub id: PaymentId,
    pub amount: Amount,
    pub currency: Currency,
    pub payer: PeerId,
    pub payee: PeerId,
    /// Hops only; payer and payee are not listed
    pub path: Route,
}

impl Payment {
    pub fn new(
        amount: Amount,
        currency: Currency,
        payer: PeerId,
        payee: PeerId,
        path: Route,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            amount,
            currency,
            payer,
            payee,
            path,
        }
    }

    /// The node the payer hands the payment to.
    pub fn first_hop(&self) -> &PeerId {
        self.path.first().unwrap_or(&self.payee)
    }

    /// Every node that must vote: the hops followed by the payee.
    pub fn participants(&self) -> impl Iterator<Item = &PeerId> {
        self.path.iter().chain(std::iter::once(&self.payee))
    }

    /// Upstream neighbour of `peer` (toward the payer).
    pub fn previous_of(&self, peer: &PeerId) -> Option<&PeerId> {
        if peer == &self.payee {
            return Some(self.path.last().unwrap_or(&self.payer));
        }
        let pos = self.path.iter().position(|hop| hop == peer)?;
        Some(if pos == 0 {
            &self.payer
        } else {
            &self.path[pos - 1]
        })
    }

    /// Downstream neighbour of `peer` (toward the payee).
    pub fn next_of(&self, peer: &PeerId) -> Option<&PeerId> {
        if peer == &self.payer {
            return Some(self.first_hop());
        }
        let pos = self.path.iter().position(|hop| hop == peer)?;
        Some(self.path.get(pos + 1).unwrap_or(&self.payee))
    }

    pub fn is_hop(&self, peer: &PeerId) -> bool {
        self.path.contains(peer)
    }

    /// Payer and payee are the same peer; nothing has to move.
    pub fn is_internal(&self) -> bool {
        self.payer == self.payee
    }

    /// A path that visits a node twice or routes through an endpoint is unusable.
    pub fn has_valid_path(&self) -> bool {
        let mut seen: Vec<&PeerId> = Vec::with_capacity(self.path.len() + 2);
        seen.push(&self.payer);
        for peer in self.participants() {
            if seen.contains(&peer) {
                return false;
            }
            seen.push(peer);
        }
        true
    }
}

#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct PaymentWire {
    id: PaymentId,
    amount: Amount,
    currency: Currency,
    payer: PeerId,
    payee: PeerId,
    path: Route,
}

#[cfg(feature = "serde")]
impl TryFrom<PaymentWire> for Payment {
    type Error = crate::numeric::ValidationError;

    fn try_from(wire: PaymentWire) -> Result<Self, Self::Error> {
        Ok(Self {
            id: wire.id,
            amount: crate::numeric::validate_amount(wire.amount)?,
            currency: wire.currency,
            payer: wire.payer,
            payee: wire.payee,
            path: wire.path,
        })
    }
}

#[cfg(feature = "serde")]
impl From<Payment> for PaymentWire {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            amount: payment.amount,
            currency: payment.currency,
            payer: payment.payer,
            payee: payment.payee,
            path: payment.path,
        }
    }
}

/// One execution of an incoming order against a resting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub resting: OrderKey,
    pub resting_side: Side,
    /// Execution price: the resting order's price
    pub price: Price,
    pub quantity: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use smallvec::smallvec;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id).unwrap()
    }

    fn payment(path: Route) -> Payment {
        Payment::new(
            Decimal::TEN,
            Currency::new("EUR").unwrap(),
            peer("payer"),
            peer("payee"),
            path,
        )
    }

    #[test]
    fn test_direct_payment_neighbours() {
        let p = payment(Route::new());
        assert_eq!(p.first_hop(), &peer("payee"));
        assert_eq!(p.previous_of(&peer("payee")), Some(&peer("payer")));
        assert_eq!(p.next_of(&peer("payer")), Some(&peer("payee")));
        assert_eq!(p.participants().count(), 1);
    }

    #[test]
    fn test_multi_hop_neighbours() {
        let p = payment(smallvec![peer("h1"), peer("h2")]);
        assert_eq!(p.first_hop(), &peer("h1"));
        assert_eq!(p.previous_of(&peer("h1")), Some(&peer("payer")));
        assert_eq!(p.next_of(&peer("h1")), Some(&peer("h2")));
        assert_eq!(p.previous_of(&peer("h2")), Some(&peer("h1")));
        assert_eq!(p.next_of(&peer("h2")), Some(&peer("payee")));
        assert_eq!(p.previous_of(&peer("payee")), Some(&peer("h2")));
        assert_eq!(p.previous_of(&peer("stranger")), None);

        let participants: Vec<&str> = p.participants().map(PeerId::as_str).collect();
        assert_eq!(participants, vec!["h1", "h2", "payee"]);
    }

    #[test]
    fn test_path_validation() {
        assert!(payment(smallvec![peer("h1")]).has_valid_path());
        assert!(!payment(smallvec![peer("h1"), peer("h1")]).has_valid_path());
        assert!(!payment(smallvec![peer("payer")]).has_valid_path());
        assert!(!payment(smallvec![peer("payee")]).has_valid_path());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_wire_amount_must_be_positive() {
        let mut json = serde_json::to_value(payment(smallvec![peer("h1")])).unwrap();
        let back: Payment = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back.path.as_slice(), &[peer("h1")]);

        json["amount"] = serde_json::json!("0");
        assert!(serde_json::from_value::<Payment>(json).is_err());
    }

    #[test]
    fn test_internal_payment() {
        let p = Payment::new(
            Decimal::ONE,
            Currency::new("EUR").unwrap(),
            peer("alice"),
            peer("alice"),
            Route::new(),
        );
        assert!(p.is_internal());
    }
}
