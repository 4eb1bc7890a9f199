use anyhow::Result;
use ash::vk;
use ash::vk::Handle;
use deimos::{BindingSignature, DescriptorBinding, DescriptorCache, DescriptorContents};

fn layout(raw: u64) -> vk::DescriptorSetLayout {
    vk::DescriptorSetLayout::from_raw(raw)
}

fn set(raw: u64) -> vk::DescriptorSet {
    vk::DescriptorSet::from_raw(raw)
}

/// A signature for a uniform buffer binding; varying the buffer handle varies the content hash.
fn signature(layout_raw: u64, buffer_raw: u64) -> BindingSignature {
    let bindings = [DescriptorBinding {
        binding: 0,
        ty: vk::DescriptorType::UNIFORM_BUFFER,
        descriptors: vec![DescriptorContents::Buffer {
            buffer: vk::Buffer::from_raw(buffer_raw),
            offset: 0,
            range: 256,
        }],
    }];
    BindingSignature::new(layout(layout_raw), &bindings)
}

#[test]
pub fn lookup_misses_until_put() -> Result<()> {
    let cache = DescriptorCache::new();
    let sig = signature(1, 1);

    assert_eq!(cache.get(&sig), None, "A fresh cache has nothing to return");

    cache.put(sig, set(100));
    assert_eq!(cache.get(&sig), Some(set(100)));
    assert_eq!(cache.len(), 1);

    Ok(())
}

#[test]
pub fn hits_update_usage_statistics() -> Result<()> {
    let cache = DescriptorCache::new();
    let sig = signature(1, 1);
    cache.put(sig, set(100));

    assert_eq!(cache.use_count(&sig), Some(0));
    cache.get(&sig);
    cache.get(&sig);
    assert_eq!(cache.use_count(&sig), Some(2));

    Ok(())
}

#[test]
pub fn signatures_differ_by_content_and_layout() -> Result<()> {
    let cache = DescriptorCache::new();
    cache.put(signature(1, 1), set(100));

    assert_eq!(
        cache.get(&signature(1, 2)),
        None,
        "Different bound resources must not alias in the cache"
    );
    assert_eq!(
        cache.get(&signature(2, 1)),
        None,
        "The same contents against a different layout is a different signature"
    );
    assert_eq!(cache.get(&signature(1, 1)), Some(set(100)));

    Ok(())
}

#[test]
pub fn capacity_eviction_drops_the_oldest_entry() -> Result<()> {
    let cache = DescriptorCache::with_bucket_capacity(3);

    for i in 0..3 {
        assert_eq!(cache.put(signature(1, i), set(100 + i)), None);
    }
    // The fourth insert overflows the bucket; the least recently used entry is evicted and its
    // handle handed back for the owner to destroy.
    let evicted = cache.put(signature(1, 3), set(103));
    assert_eq!(evicted, Some(set(100)));

    assert_eq!(cache.bucket_len(layout(1)), 3);
    assert_eq!(cache.get(&signature(1, 0)), None);
    for i in 1..4 {
        assert_eq!(cache.get(&signature(1, i)), Some(set(100 + i)));
    }

    Ok(())
}

#[test]
pub fn recent_use_protects_against_capacity_eviction() -> Result<()> {
    let cache = DescriptorCache::with_bucket_capacity(2);

    cache.put(signature(1, 0), set(100));
    cache.put(signature(1, 1), set(101));
    // Touch the older entry, promoting it to most recently used.
    cache.get(&signature(1, 0));

    let evicted = cache.put(signature(1, 2), set(102));
    assert_eq!(evicted, Some(set(101)), "The untouched entry should be the one evicted");
    assert_eq!(cache.get(&signature(1, 0)), Some(set(100)));

    Ok(())
}

#[test]
pub fn buckets_are_independent_per_layout() -> Result<()> {
    let cache = DescriptorCache::with_bucket_capacity(1);

    cache.put(signature(1, 0), set(100));
    // A full bucket for one layout does not evict entries of another.
    assert_eq!(cache.put(signature(2, 0), set(200)), None);
    assert_eq!(cache.bucket_len(layout(1)), 1);
    assert_eq!(cache.bucket_len(layout(2)), 1);

    Ok(())
}

#[test]
pub fn age_eviction_removes_stale_entries_under_capacity() -> Result<()> {
    let cache = DescriptorCache::new();
    let sig = signature(1, 1);
    cache.put(sig, set(100));

    // Within the age limit, nothing is removed even though frames pass.
    assert!(cache.next_frame(2).is_empty());
    assert!(cache.next_frame(2).is_empty());
    assert_eq!(cache.len(), 1);

    // One frame beyond max_age, the entry goes, capacity notwithstanding.
    let removed = cache.next_frame(2);
    assert_eq!(removed, vec![set(100)], "Expired handles are returned to their owner");
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.get(&sig), None);

    Ok(())
}

#[test]
pub fn recent_use_resets_the_age_clock() -> Result<()> {
    let cache = DescriptorCache::new();
    let sig = signature(1, 1);
    cache.put(sig, set(100));

    cache.next_frame(2);
    cache.next_frame(2);
    // A hit refreshes last_used_frame, so the entry survives the next sweep.
    assert_eq!(cache.get(&sig), Some(set(100)));
    assert!(cache.next_frame(2).is_empty());
    assert_eq!(cache.len(), 1);

    Ok(())
}

#[test]
pub fn frame_counter_advances_monotonically() -> Result<()> {
    let cache = DescriptorCache::new();
    assert_eq!(cache.current_frame(), 0);
    cache.next_frame(8);
    cache.next_frame(8);
    assert_eq!(cache.current_frame(), 2);

    Ok(())
}
