//! End-to-end walkthrough of the CRUD mediator over the in-memory store

use strata::prelude::*;

#[tokio::main]
async fn main() -> StrataResult<()> {
    tracing_subscriber::fmt::init();

    println!("🚀 Strata CRUD Example\n");

    // Schemas: an invoice references an account, displayed by name
    let account = EntitySchema::builder("account")
        .property("name", PropertyKind::String)
        .property("tier", PropertyKind::String)
        .build()?;

    let invoice = EntitySchema::builder("invoice")
        .property("amount", PropertyKind::Float)
        .property("issued", PropertyKind::Date)
        .reference(
            "account",
            ReferenceConfig::new(Arc::clone(&account)).with_display_property("name"),
        )
        .build()?;

    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryStore::new());
    let mediator = CrudMediator::new(invoice, Arc::clone(&store))
        .with_ordering(vec![Ordering::desc("amount")]);

    println!("📋 Creating invoices...\n");

    // The nested account has no key, so it is created and linked as part
    // of this save.
    let (_, created) = mediator
        .post(&json!({
            "amount": 99.5,
            "issued": "2026-08-01",
            "account": { "name": "Acme", "tier": "gold" },
        }))
        .await?;
    println!("✅ Created: {}", serde_json::to_string_pretty(&created)?);

    let acme_key = created["account"]["urlsafe_key"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    // A second invoice for the same account, referenced by key this time
    let (_, second) = mediator
        .post(&json!({
            "amount": 250.0,
            "issued": "2026-08-15",
            "account": { "urlsafe_key": acme_key },
        }))
        .await?;
    println!(
        "✅ Created: amount {} for {}",
        second["amount"], second["account"]["display"]
    );

    println!("\n🔍 Listing invoices (amount descending)...\n");
    let params = std::collections::HashMap::new();
    let (_, listing) = mediator.get(&params).await?;
    for item in listing.as_array().into_iter().flatten() {
        println!("  {} ({})", item["amount"], item["account"]["display"]);
    }

    println!("\n✏️  Updating the first invoice...\n");
    let key = created[RESERVED_KEY].as_str().unwrap_or_default().to_string();
    let mut params = std::collections::HashMap::new();
    params.insert("key".to_string(), key.clone());
    let (_, updated) = mediator.put(&params, &json!({ "amount": 120.0 })).await?;
    println!("✅ Updated: amount is now {}", updated["amount"]);

    println!("\n🗑️  Deleting it...\n");
    let (_, gone) = mediator.delete(&params).await?;
    println!("✅ Deleted: {}", gone);

    println!("\n✨ Example completed successfully!");
    Ok(())
}
