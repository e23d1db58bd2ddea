use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use spotlens::{
    ByteRangeFetcher, ChunkedParams, CoordParams, FeatureAndGroup, FeatureData, FeatureParams,
    FeatureValues, FetchRequest, Hydrate, HttpFetcher, ImageParams, LocalDirectory, MemoryFetcher,
    PlainParams, RetrievalConfig, Sample, SampleManifest,
};

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// `genes`: f0 stored in `[0, 5)`-style first chunk, f1 in the second
fn genes(fetcher: &MemoryFetcher) -> Vec<u64> {
    let first = gzip("index,value\n0,7\n");
    let second = gzip("index,value\n1,3\n");
    let ptr = vec![0, first.len() as u64, (first.len() + second.len()) as u64];

    let mut blob = first;
    blob.extend(second);
    fetcher.insert("mem://genes.bin", blob);
    fetcher.insert(
        "mem://genes.json",
        serde_json::json!({
            "length": 2,
            "names": ["f0", "f1"],
            "ptr": ptr,
            "sparseMode": "array",
            "coordName": "spots",
        })
        .to_string(),
    );
    ptr
}

fn manifest() -> SampleManifest {
    SampleManifest::new("V1_Mouse")
        .with_image(ImageParams {
            m_per_px: Some(0.25),
            ..ImageParams::default()
        })
        .with_coords(CoordParams::from_url("spots", "mem://spots.csv"))
        .with_feature(FeatureParams::Chunked(
            ChunkedParams::new("genes", "mem://genes.bin").with_header_url("mem://genes.json"),
        ))
        .with_feature(FeatureParams::Plain(PlainParams::from_url(
            "cells",
            "mem://cells.csv",
        )))
}

fn fixture() -> (Arc<MemoryFetcher>, Vec<u64>) {
    let fetcher = Arc::new(MemoryFetcher::new().with_latency(Duration::from_millis(5)));
    let ptr = genes(&fetcher);
    fetcher.insert("mem://spots.csv", "x,y\n0,0\n1,1\n");
    fetcher.insert("mem://cells.csv", "x,y,intensity\n5,5,0.5\n6,6,1.5\n7,7,2.5\n");
    (fetcher, ptr)
}

fn sample(fetcher: &Arc<MemoryFetcher>) -> Sample {
    Sample::new(manifest(), fetcher.clone(), RetrievalConfig::default()).unwrap()
}

#[tokio::test]
async fn test_end_to_end_range_request() {
    let (fetcher, ptr) = fixture();
    let sample = sample(&fetcher);

    let result = sample
        .get_feature(&FeatureAndGroup::new("genes", "f0"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*result.data, FeatureValues::Quantitative(vec![7.0, 0.0]));
    assert_eq!(result.coords.name(), "spots");
    assert_eq!(result.minmax, (0.0, 7.0));

    let ranged: Vec<FetchRequest> = fetcher
        .requests()
        .into_iter()
        .filter(|request| request.url == "mem://genes.bin")
        .collect();
    assert_eq!(
        ranged,
        vec![FetchRequest {
            url: "mem://genes.bin".into(),
            range: Some(0..ptr[1]),
        }]
    );
}

#[tokio::test]
async fn test_repeated_and_concurrent_requests_share_fetches() {
    let (fetcher, _) = fixture();
    let sample = sample(&fetcher);
    let f0 = FeatureAndGroup::new("genes", "f0");
    let f1 = FeatureAndGroup::new("genes", "f1");

    let (a, b) = tokio::join!(sample.get_feature(&f0), sample.get_feature(&f0));
    assert_eq!(a.unwrap().unwrap().data, b.unwrap().unwrap().data);
    assert_eq!(fetcher.request_count("mem://genes.bin"), 1);

    let second = sample.get_feature(&f1).await.unwrap().unwrap();
    assert_eq!(*second.data, FeatureValues::Quantitative(vec![0.0, 3.0]));
    assert_eq!(fetcher.request_count("mem://genes.bin"), 2);

    sample.get_feature(&f0).await.unwrap();
    assert_eq!(fetcher.request_count("mem://genes.bin"), 2);
    assert_eq!(fetcher.request_count("mem://genes.json"), 1);
}

#[tokio::test]
async fn test_rows_mint_adhoc_coordinates() {
    let (fetcher, _) = fixture();
    let sample = sample(&fetcher);

    let fg = FeatureAndGroup::new("cells", "intensity");
    let result = sample.get_feature(&fg).await.unwrap().unwrap();
    assert_eq!(result.coords.name(), "cells-intensity");
    assert_eq!(result.coords.len(), Some(3));
    // No mPerPx on the rows, so the image scale applies
    assert_eq!(result.coords.m_per_px(), Some(0.25));
    assert_eq!(*result.data, FeatureValues::Quantitative(vec![0.5, 1.5, 2.5]));

    let again = sample.get_feature(&fg).await.unwrap().unwrap();
    assert_eq!(
        again.coords.positions().unwrap(),
        result.coords.positions().unwrap()
    );

    // Misc addresses the same table by source name
    let misc = sample.get_feature(&FeatureAndGroup::misc("cells")).await.unwrap().unwrap();
    assert_eq!(misc.coords.name(), "Misc-cells");
    assert_eq!(misc.data.len(), 3);
}

#[tokio::test]
async fn test_missing_scale_yields_none() {
    let (fetcher, _) = fixture();
    let mut manifest = manifest();
    manifest.img_params = None;
    let sample = Sample::new(manifest, fetcher.clone(), RetrievalConfig::default()).unwrap();

    let result = sample
        .get_feature(&FeatureAndGroup::new("cells", "intensity"))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_absent_features_are_none() {
    let (fetcher, _) = fixture();
    let sample = sample(&fetcher);

    for fg in [
        FeatureAndGroup::new("proteins", "CD4"),
        FeatureAndGroup::new("genes", "f9"),
        FeatureAndGroup::new("cells", "missing"),
        FeatureAndGroup::misc("genes"),
    ] {
        assert!(sample.get_feature(&fg).await.unwrap().is_none(), "{fg}");
    }
}

#[tokio::test]
async fn test_sample_hydration() {
    let (fetcher, _) = fixture();
    fetcher.remove("mem://cells.csv");
    let sample = sample(&fetcher);

    // One failing sibling does not stop the others
    assert!(sample.hydrate().await.is_err());
    assert!(!sample.is_hydrated());
    assert!(sample.coords("spots").unwrap().is_hydrated());
    assert_eq!(
        sample.source("genes").unwrap().feature_names(),
        Some(vec!["f0".to_string(), "f1".to_string()])
    );

    fetcher.insert("mem://cells.csv", "x,y,intensity\n5,5,0.5\n");
    sample.hydrate().await.unwrap();
    sample.hydrate().await.unwrap();
    assert!(sample.is_hydrated());
    assert_eq!(fetcher.request_count("mem://spots.csv"), 1);
    assert_eq!(fetcher.request_count("mem://genes.json"), 1);
}

#[tokio::test]
async fn test_record_mode_joins_on_id() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let chunk = gzip("index,value\n1,4\n");
    fetcher.insert("mem://cells.bin", chunk.clone());
    fetcher.insert("mem://spots.csv", "x,y,id\n0,0,a\n1,1,b\n2,2,c\n");

    let header = serde_json::from_value(serde_json::json!({
        "length": 3,
        "names": ["a", "b", "c"],
        "ptr": [0, chunk.len(), chunk.len(), chunk.len()],
        "sparseMode": "record",
        "coordName": "spots",
    }))
    .unwrap();
    let manifest = SampleManifest::new("record")
        .with_coords(CoordParams::from_url("spots", "mem://spots.csv"))
        .with_feature(FeatureParams::Chunked(
            ChunkedParams::new("types", "mem://cells.bin").with_header(header),
        ));
    let sample = Sample::new(manifest, fetcher.clone(), RetrievalConfig::default()).unwrap();

    let source = sample.source("types").unwrap();
    let spotlens::FeatureSource::Chunked(chunked) = source else {
        panic!("expected a chunked source");
    };
    let retrieved = chunked.retrieve("a").await.unwrap().unwrap();
    assert_eq!(
        retrieved.data,
        FeatureData::Record([("b".to_string(), 4.0)].into_iter().collect())
    );

    let result = sample
        .get_feature(&FeatureAndGroup::new("types", "a"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*result.data, FeatureValues::Quantitative(vec![0.0, 4.0, 0.0]));
}

#[tokio::test]
async fn test_unparsable_chunk_is_absent() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let bad = gzip("index,value\nnot-a-number,1\n");
    fetcher.insert("mem://g.bin", bad.clone());
    fetcher.insert("mem://spots.csv", "x,y\n0,0\n1,1\n");

    let header = serde_json::from_value(serde_json::json!({
        "length": 1,
        "names": ["g0"],
        "ptr": [0, bad.len()],
        "sparseMode": "array",
        "coordName": "spots",
    }))
    .unwrap();
    let manifest = SampleManifest::new("unparsable")
        .with_coords(CoordParams::from_url("spots", "mem://spots.csv"))
        .with_feature(FeatureParams::Chunked(
            ChunkedParams::new("g", "mem://g.bin").with_header(header),
        ));
    let sample = Sample::new(manifest, fetcher.clone(), RetrievalConfig::default()).unwrap();
    let g0 = FeatureAndGroup::new("g", "g0");

    assert!(sample.get_feature(&g0).await.unwrap().is_none());

    // Failures are not memoized, so the next call fetches again
    assert!(sample.get_feature(&g0).await.unwrap().is_none());
    assert_eq!(fetcher.request_count("mem://g.bin"), 2);
}

#[tokio::test]
async fn test_source_without_data_is_skipped() {
    let (fetcher, _) = fixture();
    let manifest = manifest().with_feature(FeatureParams::Plain(PlainParams {
        name: "empty".into(),
        ..PlainParams::default()
    }));
    let sample = Sample::new(manifest, fetcher.clone(), RetrievalConfig::default()).unwrap();

    assert!(sample.source("empty").is_none());
    assert!(sample
        .get_feature(&FeatureAndGroup::misc("empty"))
        .await
        .unwrap()
        .is_none());
    assert!(sample
        .get_feature(&FeatureAndGroup::new("genes", "f0"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_local_folder_mode() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = MemoryFetcher::new();
    genes(&fixture);
    for name in ["genes.bin", "genes.json"] {
        let bytes = fixture.fetch(&format!("mem://{name}")).await.unwrap();
        std::fs::write(dir.path().join(name), &bytes).unwrap();
    }
    std::fs::write(dir.path().join("spots.csv"), "x,y\n0,0\n1,1\n").unwrap();
    std::fs::write(
        dir.path().join("sample.json"),
        serde_json::json!({
            "name": "local",
            "coordParams": [{"name": "spots", "url": "spots.csv"}],
            "featParams": [{"type": "chunkedCSV", "name": "genes", "url": "genes.bin", "headerUrl": "genes.json"}],
        })
        .to_string(),
    )
    .unwrap();

    let directory = LocalDirectory::open(dir.path()).unwrap();
    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let sample = Sample::load_local(directory, fetcher, RetrievalConfig::default())
        .await
        .unwrap();
    assert!(sample.local_directory().is_some());

    let result = sample
        .get_feature(&FeatureAndGroup::new("genes", "f1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*result.data, FeatureValues::Quantitative(vec![0.0, 3.0]));
}

#[tokio::test]
async fn test_subsampled_coordinates_keep_idx() {
    let fetcher = Arc::new(MemoryFetcher::new());
    let mut csv = String::from("x,y\n");
    let mut values = String::from("index,value\n");
    for i in 0..100 {
        csv.push_str(&format!("{i},{i}\n"));
        values.push_str(&format!("{i},{i}\n"));
    }
    let chunk = gzip(&values);
    fetcher.insert("mem://spots.csv", csv);
    fetcher.insert("mem://dense.bin", chunk.clone());

    let mut header = spotlens::ChunkHeader::new(100, vec![0; 101])
        .with_sparse_mode(spotlens::SparseMode::Array)
        .with_coord_name("spots");
    header.ptr[1..].fill(chunk.len() as u64);
    let manifest = SampleManifest::new("subsampled")
        .with_coords(CoordParams::from_url("spots", "mem://spots.csv"))
        .with_feature(FeatureParams::Chunked(
            ChunkedParams::new("dense", "mem://dense.bin").with_header(header),
        ));
    let sample = Sample::new(
        manifest,
        fetcher.clone(),
        RetrievalConfig::default().with_subsample_target(10),
    )
    .unwrap();

    let result = sample
        .get_feature(&FeatureAndGroup::new("dense", "0"))
        .await
        .unwrap()
        .unwrap();
    let positions = result.coords.positions().unwrap();
    assert_eq!(positions.len(), 10);
    assert_eq!(positions[3].idx, 30);
    assert_eq!(result.data.as_numbers().unwrap()[3], 30.0);
}
