//! Line price computation
//!
//! `base_price * size multiplier + crust surcharge + chargeable add-ons`.
//! The first [`FREE_ADDON_ALLOWANCE`] add-ons (in selection order) are
//! free; each one past the allotment is charged at its listed price, or
//! [`DEFAULT_ADDON_PRICE`] when unpriced.

use rust_decimal::prelude::*;
use shared::order::{AddOn, CartItemInput, Crust, OrderItem, Size};

/// Free add-ons included with every pizza.
pub const FREE_ADDON_ALLOWANCE: usize = 3;

/// Flat charge for an unpriced add-on past the free allotment.
pub const DEFAULT_ADDON_PRICE: f64 = 150.0;

fn size_multiplier(size: Size) -> Decimal {
    match size {
        Size::Small => Decimal::ONE,
        Size::Medium => Decimal::new(12, 1),
        Size::Large => Decimal::new(14, 1),
    }
}

fn dec(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unit price for one configured pizza.
pub fn compute_line_price(base_price: f64, size: Size, crust: &Crust, add_ons: &[AddOn]) -> f64 {
    let mut price = dec(base_price) * size_multiplier(size) + dec(crust.surcharge);

    for add_on in add_ons.iter().skip(FREE_ADDON_ALLOWANCE) {
        price += dec(add_on.price.unwrap_or(DEFAULT_ADDON_PRICE));
    }

    round2(price).to_f64().unwrap_or(0.0)
}

/// Price a checkout line into its persisted snapshot.
pub fn price_item(input: &CartItemInput) -> OrderItem {
    let unit_price = compute_line_price(input.base_price, input.size, &input.crust, &input.add_ons);
    let line_total = round2(dec(unit_price) * Decimal::from(input.quantity))
        .to_f64()
        .unwrap_or(0.0);

    OrderItem {
        product_id: input.product_id.clone(),
        name: input.name.clone(),
        size: input.size,
        crust: input.crust.clone(),
        add_ons: input.add_ons.clone(),
        unit_price,
        quantity: input.quantity,
        line_total,
    }
}

/// Order subtotal over priced line items.
pub fn subtotal(items: &[OrderItem]) -> f64 {
    let sum = items.iter().fold(Decimal::ZERO, |acc, item| {
        acc + dec(item.line_total)
    });
    round2(sum).to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crust(name: &str, surcharge: f64) -> Crust {
        Crust {
            name: name.into(),
            surcharge,
        }
    }

    fn priced(name: &str, price: f64) -> AddOn {
        AddOn {
            name: name.into(),
            price: Some(price),
        }
    }

    #[test]
    fn worked_example_from_menu() {
        // base 1200, medium x1.2 = 1440, stuffed +350 = 1790,
        // 5 add-ons of which 2 are chargeable at 150 => 2090.00
        let add_ons = vec![
            priced("olives", 150.0),
            priced("onion", 150.0),
            priced("corn", 150.0),
            priced("paneer", 150.0),
            priced("jalapeno", 150.0),
        ];
        let price = compute_line_price(1200.0, Size::Medium, &crust("Stuffed", 350.0), &add_ons);
        assert_eq!(price, 2090.0);
    }

    #[test]
    fn first_three_add_ons_are_free() {
        let base = compute_line_price(1000.0, Size::Small, &crust("Classic", 0.0), &[]);
        for count in 1..=FREE_ADDON_ALLOWANCE {
            let add_ons: Vec<AddOn> = (0..count).map(|i| priced(&format!("a{i}"), 200.0)).collect();
            let price = compute_line_price(1000.0, Size::Small, &crust("Classic", 0.0), &add_ons);
            assert_eq!(price, base, "{count} add-ons should not change the price");
        }
    }

    #[test]
    fn fourth_add_on_charges_its_own_price() {
        let three: Vec<AddOn> = (0..3).map(|i| priced(&format!("a{i}"), 99.0)).collect();
        let mut four = three.clone();
        four.push(priced("extra", 180.0));

        let p3 = compute_line_price(1000.0, Size::Large, &crust("Classic", 0.0), &three);
        let p4 = compute_line_price(1000.0, Size::Large, &crust("Classic", 0.0), &four);
        assert_eq!(p4 - p3, 180.0);
    }

    #[test]
    fn unpriced_add_on_falls_back_to_flat_default() {
        let mut add_ons: Vec<AddOn> = (0..3).map(|i| priced(&format!("a{i}"), 50.0)).collect();
        add_ons.push(AddOn {
            name: "mystery".into(),
            price: None,
        });

        let with_default = compute_line_price(500.0, Size::Small, &crust("Classic", 0.0), &add_ons);
        let without = compute_line_price(500.0, Size::Small, &crust("Classic", 0.0), &add_ons[..3]);
        assert_eq!(with_default - without, DEFAULT_ADDON_PRICE);
    }

    #[test]
    fn deterministic_and_non_negative() {
        let add_ons = vec![priced("a", 10.0), AddOn { name: "b".into(), price: None }];
        let a = compute_line_price(0.0, Size::Medium, &crust("Thin", 0.0), &add_ons);
        let b = compute_line_price(0.0, Size::Medium, &crust("Thin", 0.0), &add_ons);
        assert_eq!(a, b);
        assert!(a >= 0.0);
    }

    #[test]
    fn line_total_scales_with_quantity() {
        let input = CartItemInput {
            product_id: "p1".into(),
            name: "Veggie".into(),
            base_price: 1200.0,
            size: Size::Medium,
            crust: crust("Stuffed", 350.0),
            add_ons: vec![],
            quantity: 2,
        };
        let item = price_item(&input);
        assert_eq!(item.unit_price, 1790.0);
        assert_eq!(item.line_total, 3580.0);
        assert_eq!(subtotal(&[item]), 3580.0);
    }
}
