//! A bounded, age-aware cache of descriptor-set handles.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use ash::vk;

/// Default maximum number of entries per signature bucket.
pub const DEFAULT_BUCKET_CAPACITY: usize = 16;

/// The contents bound at one descriptor.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum DescriptorContents {
    Buffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    Image {
        view: vk::ImageView,
        layout: vk::ImageLayout,
        sampler: vk::Sampler,
    },
}

/// One binding slot of a descriptor set: slot index, descriptor type, and the bound resources.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub ty: vk::DescriptorType,
    pub descriptors: Vec<DescriptorContents>,
}

/// Identifies an equivalence class of descriptor-set binding configurations: the set layout
/// handle plus a content hash over the binding descriptions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BindingSignature {
    pub layout: vk::DescriptorSetLayout,
    pub content_hash: u64,
}

impl BindingSignature {
    /// Compute the signature for a set of binding descriptions against a layout.
    pub fn new(layout: vk::DescriptorSetLayout, bindings: &[DescriptorBinding]) -> Self {
        let mut hasher = DefaultHasher::new();
        bindings.hash(&mut hasher);
        Self {
            layout,
            content_hash: hasher.finish(),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    signature: BindingSignature,
    handle: vk::DescriptorSet,
    last_used_frame: u64,
    use_count: u64,
}

#[derive(Debug)]
struct CacheInner {
    /// Buckets are keyed by layout; within a bucket, entries are ordered most-recently-used
    /// first and distinguished by their content hash.
    buckets: HashMap<vk::DescriptorSetLayout, Vec<CacheEntry>>,
    bucket_capacity: usize,
    current_frame: u64,
}

/// Caches descriptor-set handles by [`BindingSignature`].
///
/// The cache never allocates or destroys descriptor sets. On a miss the caller creates a set and
/// [`put`](Self::put)s it; on eviction (capacity in `put`, age in [`next_frame`](Self::next_frame))
/// the evicted handles are returned so the owner can recycle or destroy them.
///
/// All operations are serialized by a single internal mutex.
#[derive(Debug)]
pub struct DescriptorCache {
    inner: Mutex<CacheInner>,
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorCache {
    /// Create a cache with the default per-bucket capacity.
    pub fn new() -> Self {
        Self::with_bucket_capacity(DEFAULT_BUCKET_CAPACITY)
    }

    /// Create a cache that holds at most `capacity` entries per signature bucket.
    pub fn with_bucket_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                buckets: HashMap::new(),
                bucket_capacity: capacity.max(1),
                current_frame: 0,
            }),
        }
    }

    /// Look up a cached descriptor set. A hit updates the entry's usage statistics and promotes
    /// it to the front of its bucket. A miss returns `None`; the caller is expected to create a
    /// new descriptor set and [`put`](Self::put) it.
    pub fn get(&self, signature: &BindingSignature) -> Option<vk::DescriptorSet> {
        let mut inner = self.inner.lock().unwrap();
        let frame = inner.current_frame;
        let bucket = inner.buckets.get_mut(&signature.layout)?;
        let index = bucket.iter().position(|entry| entry.signature == *signature)?;
        let mut entry = bucket.remove(index);
        entry.last_used_frame = frame;
        entry.use_count += 1;
        let handle = entry.handle;
        bucket.insert(0, entry);
        Some(handle)
    }

    /// Insert a descriptor set at the front of its signature's bucket. If the bucket is at
    /// capacity, the least-recently-used entry is evicted first and its handle returned;
    /// destroying (or recycling) the evicted set is the caller's responsibility.
    pub fn put(
        &self,
        signature: BindingSignature,
        handle: vk::DescriptorSet,
    ) -> Option<vk::DescriptorSet> {
        let mut inner = self.inner.lock().unwrap();
        let frame = inner.current_frame;
        let capacity = inner.bucket_capacity;
        let bucket = inner.buckets.entry(signature.layout).or_default();
        let evicted = if bucket.len() >= capacity {
            bucket.pop().map(|entry| entry.handle)
        } else {
            None
        };
        bucket.insert(
            0,
            CacheEntry {
                signature,
                handle,
                last_used_frame: frame,
                use_count: 0,
            },
        );
        evicted
    }

    /// Advance the frame counter and remove every entry not used for more than `max_age` frames,
    /// independent of bucket capacity. Returns the removed handles; their ownership is the
    /// caller's.
    pub fn next_frame(&self, max_age: u64) -> Vec<vk::DescriptorSet> {
        let mut inner = self.inner.lock().unwrap();
        inner.current_frame += 1;
        let frame = inner.current_frame;
        let mut removed = vec![];
        for bucket in inner.buckets.values_mut() {
            bucket.retain(|entry| {
                if frame - entry.last_used_frame > max_age {
                    removed.push(entry.handle);
                    false
                } else {
                    true
                }
            });
        }
        inner.buckets.retain(|_, bucket| !bucket.is_empty());
        removed
    }

    /// Total number of cached entries across all buckets.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.buckets.values().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries cached for one layout's bucket.
    pub fn bucket_len(&self, layout: vk::DescriptorSetLayout) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.buckets.get(&layout).map(Vec::len).unwrap_or(0)
    }

    /// How many times `get` hit this signature since it was inserted.
    pub fn use_count(&self, signature: &BindingSignature) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        let bucket = inner.buckets.get(&signature.layout)?;
        bucket
            .iter()
            .find(|entry| entry.signature == *signature)
            .map(|entry| entry.use_count)
    }

    /// The current frame counter.
    pub fn current_frame(&self) -> u64 {
        self.inner.lock().unwrap().current_frame
    }
}
