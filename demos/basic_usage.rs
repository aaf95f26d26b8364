//! Basic usage example: build a forest, query it, save it and map it back.
//!
//! Run with: cargo run --example basic_usage

use forge_forest::{AngularIndex, Dataset, Persistable, SearchParams};
use tracing_subscriber::EnvFilter;

fn main() -> forge_forest::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Random Projection Forest Demo ===\n");

    let dim = 40;
    let dataset = Dataset::generate(5_000, 5, dim, 42);
    println!("Generated {} random {}-dimensional vectors\n", dataset.vectors.len(), dim);

    let mut index = AngularIndex::<f32>::new(dim)?;
    index.set_verbose(true);
    for (i, vector) in dataset.vectors.iter().enumerate() {
        index.add_item(i as u32, vector)?;
    }

    let start = std::time::Instant::now();
    index.build(Some(10))?;
    println!("\nBuilt {} trees in {:.2?}", index.n_trees(), start.elapsed());
    println!("{}\n", index.statistics().summary());

    println!("=== Nearest Neighbors of Item 0 ===\n");
    for result in index.get_nns_by_item(0, 5, None)? {
        println!("  item {:>5}  distance {:.4}", result.id.0, result.distance);
    }

    println!("\n=== Query Vector Search ===\n");
    let params = SearchParams::new(5).with_search_k(2_000);
    let (results, stats) = index.get_nns_by_vector_with_stats(&dataset.queries[0], &params)?;
    for result in &results {
        println!("  item {:>5}  distance {:.4}", result.id.0, result.distance);
    }
    println!("\n{}", stats.summary());

    println!("\n=== Save and Load ===\n");
    let path = std::env::temp_dir().join("forge_forest_demo.ann");
    index.save(&path, false)?;

    let mut loaded = AngularIndex::<f32>::new(dim)?;
    loaded.load(&path, true)?;
    println!(
        "Loaded {} items in {} trees from {} ({})",
        loaded.n_items(),
        loaded.n_trees(),
        path.display(),
        loaded.backend()
    );

    let again = loaded.get_nns_by_vector_with(&dataset.queries[0], &params)?;
    println!(
        "Results after reload are {}",
        if again == results { "identical" } else { "DIFFERENT" }
    );

    loaded.unload();
    index.unload();
    std::fs::remove_file(&path)?;
    Ok(())
}
