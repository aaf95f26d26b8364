//! Measure forest recall against brute force ground truth.
//!
//! Run with: cargo run --example measure_recall --release

use forge_forest::{recall_at_k, Dataset, EuclideanIndex, Metric, SearchParams};

fn main() -> forge_forest::Result<()> {
    println!("Generating dataset...");
    let mut dataset = Dataset::generate(10_000, 100, 64, 7);

    println!("Computing ground truth with brute force...");
    dataset.compute_ground_truth(100, Metric::Euclidean)?;

    println!("Building index...");
    let mut index = EuclideanIndex::<f32>::new(dataset.dimensions)?;
    for (i, vector) in dataset.vectors.iter().enumerate() {
        index.add_item(i as u32, vector)?;
    }
    let start = std::time::Instant::now();
    index.build_parallel(Some(50), 4)?;
    println!(
        "Built {} trees ({} nodes) in {:.2?}\n",
        index.n_trees(),
        index.n_nodes(),
        start.elapsed()
    );

    println!("Measuring recall@10...\n");
    let k = 10;

    for search_k in [100, 500, 1_000, 5_000, 20_000, 100_000] {
        let params = SearchParams::new(k).with_search_k(search_k);
        let mut total_recall = 0.0;
        let start = std::time::Instant::now();

        for (query, truth) in dataset.queries.iter().zip(&dataset.ground_truth) {
            let results = index.get_nns_by_vector_with(query, &params)?;
            let predicted: Vec<u32> = results.iter().map(|r| r.id.0).collect();
            total_recall += recall_at_k(&predicted, truth, k);
        }

        let elapsed = start.elapsed();
        let avg_recall = total_recall / dataset.queries.len() as f32;
        println!(
            "search_k {:>6}: recall {:>6.2}%  ({:.3}ms/query)",
            search_k,
            avg_recall * 100.0,
            elapsed.as_secs_f64() * 1000.0 / dataset.queries.len() as f64
        );
    }

    println!("\nRecall should grow with search_k and reach 100% once every leaf is visited.");
    Ok(())
}
