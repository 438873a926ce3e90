//! Chunking properties over arbitrary images

use infinite_hd::chunk::{Chunker, ImageReader};
use infinite_hd::manifest::{chunk_count, ChunkRef};
use infinite_hd::store::MemoryChunkStore;
use proptest::prelude::*;

/// Images with long zero runs so that zero chunks actually occur
fn image_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            3 => Just(vec![0u8; 16]),
            1 => prop::collection::vec(any::<u8>(), 1..24),
        ],
        0..16,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn chunks_reassemble_to_the_image(image in image_strategy(), chunk_size in 1usize..40) {
        let store = MemoryChunkStore::new();
        let (manifest, stats) = Chunker::new(&store, chunk_size).chunk_image("p", &image).unwrap();

        prop_assert_eq!(manifest.chunks.len() as u64, chunk_count(image.len() as u64, chunk_size as u64));
        prop_assert_eq!(stats.total_chunks, manifest.chunks.len());
        prop_assert_eq!(store.len(), stats.stored_chunks);

        let reader = ImageReader::new(&manifest, &store).unwrap();
        prop_assert_eq!(reader.reconstruct().unwrap(), image.clone());

        for (chunk, slice) in manifest.chunks.iter().zip(image.chunks(chunk_size)) {
            let all_zero = slice.iter().all(|b| *b == 0);
            prop_assert_eq!(*chunk == ChunkRef::Zero, all_zero);
        }
    }

    #[test]
    fn read_at_matches_slices(image in image_strategy(), offset in 0usize..300, len in 0usize..64) {
        let store = MemoryChunkStore::new();
        let (manifest, _) = Chunker::new(&store, 16).chunk_image("p", &image).unwrap();
        let reader = ImageReader::new(&manifest, &store).unwrap();

        let mut buf = vec![0xAAu8; len];
        let read = reader.read_at(offset as u64, &mut buf).unwrap();
        let start = offset.min(image.len());
        let end = (offset + len).min(image.len());
        prop_assert_eq!(read, end - start);
        prop_assert_eq!(&buf[..read], &image[start..end]);
    }
}
