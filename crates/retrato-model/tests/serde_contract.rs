use chrono::Utc;
use retrato_core::{CustomerId, GenerationId, OrderId};
use retrato_model::{
    CustomerDraft, Generation, GenerationStatus, Order, OrderStatus, PortraitStyle, ProductKind,
    ShippingAddress,
};

#[test]
fn order_rows_round_trip_as_json() {
    let order = Order {
        id: OrderId::generate(),
        generation_id: GenerationId::generate(),
        customer_id: CustomerId::generate(),
        product: ProductKind::Canvas,
        size: Some("40x60cm".to_string()),
        price_cents: 19900,
        status: OrderStatus::PendingPayment,
        charge_id: "pix_char_123".to_string(),
        shipping_address: Some(ShippingAddress {
            street: "Rua das Laranjeiras".to_string(),
            number: "52".to_string(),
            complement: None,
            neighborhood: "Laranjeiras".to_string(),
            city: "Rio de Janeiro".to_string(),
            state: "RJ".to_string(),
            zip: "22240-000".to_string(),
        }),
        tracking_code: None,
        notes: None,
        created_at: Utc::now(),
        paid_at: None,
        shipped_at: None,
    };
    let json = serde_json::to_string(&order).expect("serialize order");
    let back: Order = serde_json::from_str(&json).expect("deserialize order");
    assert_eq!(back, order);
}

#[test]
fn shipping_address_rejects_unknown_fields() {
    let raw = r#"{
        "street": "Rua A",
        "number": "1",
        "neighborhood": "Centro",
        "city": "Sao Paulo",
        "state": "SP",
        "zip": "01000-000",
        "country": "BR"
    }"#;
    assert!(serde_json::from_str::<ShippingAddress>(raw).is_err());
}

#[test]
fn generation_rows_round_trip_as_json() {
    let generation = Generation {
        id: GenerationId::generate(),
        style: PortraitStyle::Baroque,
        status: GenerationStatus::Completed,
        original_path: "originals/x/original.jpg".to_string(),
        generated_path: Some("generated/x/clean.jpg".to_string()),
        watermarked_path: Some("watermarked/x/preview.jpg".to_string()),
        created_at: Utc::now(),
    };
    let json = serde_json::to_string(&generation).expect("serialize generation");
    let back: Generation = serde_json::from_str(&json).expect("deserialize generation");
    assert_eq!(back, generation);
}

#[test]
fn customer_draft_validation_covers_required_fields() {
    let ok = CustomerDraft {
        name: "Ana Paula Souza".to_string(),
        email: "ana@example.com".to_string(),
        cellphone: "11999990000".to_string(),
        tax_id: "123.456.789-09".to_string(),
    };
    assert!(ok.validate().is_ok());
    assert_eq!(ok.first_name(), "Ana");

    let mut missing_name = ok.clone();
    missing_name.name = "  ".to_string();
    assert!(missing_name.validate().is_err());

    let mut bad_email = ok.clone();
    bad_email.email = "ana.example.com".to_string();
    assert!(bad_email.validate().is_err());

    let mut padded_email = ok.clone();
    padded_email.email = " ana@example.com".to_string();
    assert!(padded_email.validate().is_err());

    let mut missing_tax = ok;
    missing_tax.tax_id = String::new();
    assert!(missing_tax.validate().is_err());
}

#[test]
fn cellphone_is_optional_in_checkout_payloads() {
    let raw = r#"{
        "name": "Bruno Lima",
        "email": "bruno@example.com",
        "tax_id": "390.533.447-05"
    }"#;
    let draft: CustomerDraft = serde_json::from_str(raw).expect("deserialize draft");
    assert!(draft.cellphone.is_empty());
    assert!(draft.validate().is_ok());
}
