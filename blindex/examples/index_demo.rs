//! Walk-through of normalize → hash → search planning.

use blindex::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("blindex demo");
    println!("============\n");

    // In production the key comes from blindex-key-file or a KMS; a fixed
    // key keeps the demo self-contained.
    let key = IndexKey::new(vec![42u8; 32])?;
    let indexer = BlindIndexer::new(key)?;
    println!("✓ Indexer created (key version {})\n", indexer.key_version());

    let raw = "  Maria   Dela Cruz ";
    let normalized = normalize(raw, FieldKind::Name).expect("non-empty name");
    println!("Raw name:        {raw:?}");
    println!("Normalized name: {normalized:?}\n");

    let index = indexer.attribute_index(raw, FieldKind::Name).expect("non-empty name");
    println!("Exact index: {}", index.exact());
    println!("Prefix index ({} tags):", index.prefix().len());
    for tag in index.prefix() {
        println!("  {tag}");
    }
    println!();

    // A user typing "mar" finds the record without any decryption.
    let query = indexer.search_query("mar");
    let hit = index.prefix().contains(&query.token_hashes()[0]);
    println!("Query \"mar\" matches: {hit}");
    assert!(hit);

    // Tokens are never re-merged across whitespace.
    let query = indexer.search_query("delacruz");
    let miss = index.prefix().contains(&query.token_hashes()[0]);
    println!("Query \"delacruz\" matches: {miss}");
    assert!(!miss);

    Ok(())
}
