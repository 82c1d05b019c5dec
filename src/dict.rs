//! Hash dictionary (C9): chained-bucket hash table with byte-string keys
//! (and a `u32` code-point variant), grounded on `dictionary.c` /
//! `wdictionary.c`.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::container::{Container, Header, Keyed};
use crate::error::{Error, Result};
use crate::iter::{self, Cursor};
use crate::malloc::{Allocator, GlobalAllocator};
use crate::observer::{self, subject_id, Event};
use crate::serialize::{self, FrameHeader, Stream, DICTIONARY_TAG};

/// The 256-entry randomizer table used by the "times-33" hash, reproduced
/// verbatim from `dictionary.c`.
pub const SCATTER: [u32; 256] = [
    3376649973, 2288603946, 1954268477, 2858154129, 3254987376, 1888560329, 2079711150, 1249903931,
    2056019508, 3475721719, 2183608578, 1948585191, 3510366957, 479341015, 137912281, 1856397162,
    701025146, 3777855647, 3133726730, 4113368641, 251772918, 2859869442, 824540103, 614317204,
    3085688794, 1104489690, 3600905459, 1036657084, 1960148944, 2441465117, 3633092952, 1202079507,
    1804386472, 3798190281, 2511419699, 1032473403, 3235883220, 2593233477, 2484192352, 1834174643,
    3630460796, 3436981729, 876656665, 1144446061, 2179315054, 2142937421, 1163901871, 703364539,
    1635510196, 1558480853, 3800782692, 604753589, 3558571372, 274373881, 183696063, 4013401969,
    3787387983, 551169993, 2706792174, 475596077, 784566245, 2043924368, 1567342084, 3331009165,
    150886268, 596437426, 2420547845, 2898343441, 1643521607, 1387052253, 691524517, 1709282085,
    2105726706, 326318904, 2270893751, 1547094850, 273913063, 1180303327, 1015098316, 1122706416,
    1025137522, 1445737386, 3992079916, 3230843455, 3002906788, 3543652723, 1755107124, 1921014418,
    683842306, 2503306554, 3688139822, 3812611237, 3363198012, 1643682998, 285631714, 1910683492,
    4281003621, 3709237568, 2736065042, 1422760317, 862182498, 2248178396, 3197393735, 3974531276,
    157092128, 3859796014, 851355354, 2511336234, 3700246600, 572627716, 1519995253, 342913937,
    328362706, 3497158594, 739312110, 1482159142, 4059308452, 1115275813, 2279798033, 3563459711,
    102382981, 698626900, 2506327534, 2223405777, 1827275406, 159038005, 4159863896, 3470995235,
    130302168, 1077990744, 1441602901, 2757433577, 200115595, 993264331, 2598999266, 3842878136,
    3530540372, 1361428823, 248277624, 1339695154, 432480863, 2895143187, 3166708344, 2393286685,
    4271569970, 869342786, 473223354, 126812611, 3904940903, 1637555894, 996061127, 1088298011,
    2952176066, 2858912209, 4228613491, 4236158822, 2582423590, 2525024672, 3677112391, 3629698756,
    1496034522, 2081171139, 2352170546, 176561938, 3553901024, 1142683711, 2409311685, 672560988,
    3693784086, 689665476, 1992869305, 2102947696, 1890679203, 2387696458, 1988263978, 1536664131,
    768867302, 2456175399, 3136223828, 202652382, 4142812934, 245277491, 2630667112, 240720193,
    2395371056, 707955862, 4095017737, 3236774548, 3681653056, 3285235880, 807411619, 721125152,
    2671591148, 4255706610, 1694083953, 3615121285, 2744541524, 2146568054, 432941567, 1070843254,
    2173029527, 3630977578, 3297023538, 77429635, 4131306785, 1890732898, 2010001485, 1144304337,
    1673699809, 1335369816, 3596270401, 3614930280, 170584627, 190006287, 1491467787, 821380901,
    196708749, 986375533, 3133295550, 2991205574, 3983654535, 3338932148, 2374084740, 4292366978,
    3657247497, 3856158535, 1497347358, 3204988225, 2733738804, 1120807021, 450893717, 2518878143,
    55245244, 435713941, 688959256, 3878081060, 3828717777, 2111290183, 3684667667, 147090689,
    671188737, 1379556449, 1326383789, 1628432838, 462410620, 544713991, 1591539421, 2938270133,
    1902128118, 560215823, 4293430683, 1041753686, 1365246147, 2681506285, 500008709, 1129892475,
];

/// Bucket-count schedule. The leading duplicate `509` is carried verbatim
/// from the source — it is the sentinel floor for a zero construction hint.
const PRIMES: [usize; 10] = [509, 509, 1021, 2053, 4093, 8191, 16381, 32771, 65521, 131071];

fn bucket_count_for_hint(hint: usize) -> usize {
    PRIMES.iter().copied().find(|&p| p >= hint).unwrap_or(*PRIMES.last().expect("non-empty"))
}

/// The "times-33" string hash: `h <- 0; for each byte b: h <- h*33 + scatter[b]`.
pub fn hash_bytes(key: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in key {
        h = h.wrapping_mul(33).wrapping_add(SCATTER[b as usize]);
    }
    h
}

/// The wide-key fold: each byte of the code point is looked up in
/// [`SCATTER`] and combined with a per-byte rotation so all four lookups
/// contribute independently (an endian-neutral fold — `wdictionary.c` is a
/// one-line stub with no body to follow bit-for-bit, see `DESIGN.md`).
pub fn hash_code_point(cp: u32) -> u32 {
    SCATTER[(cp & 0xff) as usize]
        ^ SCATTER[((cp >> 8) & 0xff) as usize].rotate_left(1)
        ^ SCATTER[((cp >> 16) & 0xff) as usize].rotate_left(2)
        ^ SCATTER[((cp >> 24) & 0xff) as usize].rotate_left(3)
}

struct Entry<V> {
    key: Vec<u8>,
    value: V,
    next: Option<Box<Entry<V>>>,
}

/// A byte-string-keyed hash dictionary.
pub struct Dictionary<V, A: Allocator = GlobalAllocator> {
    header: Header,
    buckets: Vec<Option<Box<Entry<V>>>>,
    allocator: A,
    destructor: Option<Box<dyn FnMut(&mut V)>>,
    error_reporter: Option<Box<dyn FnMut(&str, Error)>>,
}

impl<V> Dictionary<V, GlobalAllocator> {
    pub fn new() -> Self {
        Self::with_hint(0)
    }

    /// Construct with a bucket-count hint, rounded up to the schedule.
    pub fn with_hint(hint: usize) -> Self {
        Self::with_allocator(hint, GlobalAllocator)
    }

    /// Read back a dictionary previously written by [`Dictionary::save`].
    /// `Err(Error::WrongFile)` if the stream's kind tag doesn't match.
    pub fn load(stream: &mut dyn Stream, mut decode: impl FnMut(&mut dyn Stream) -> Result<V>) -> Result<Dictionary<V, GlobalAllocator>> {
        let header = serialize::read_frame(stream, DICTIONARY_TAG)?;
        let key_count = serialize::read_uleb128(stream)?;
        let mut keys = Vec::with_capacity(key_count as usize);
        for _ in 0..key_count {
            keys.push(serialize::read_bytes_framed(stream)?);
        }
        let value_count = serialize::read_uleb128(stream)?;
        if value_count != key_count {
            return Err(Error::Internal);
        }
        let mut out = Dictionary::with_hint(header.count as usize);
        for key in keys {
            let value = decode(stream)?;
            out.add(&key, value)?;
        }
        out.header.flags = header.flags;
        Ok(out)
    }
}

impl<V> Default for Dictionary<V, GlobalAllocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, A: Allocator> Dictionary<V, A> {
    pub fn with_allocator(hint: usize, allocator: A) -> Self {
        let count = bucket_count_for_hint(hint);
        let mut buckets = Vec::with_capacity(count);
        buckets.resize_with(count, || None);
        Dictionary { header: Header::new(), buckets, allocator, destructor: None, error_reporter: None }
    }

    fn report(&mut self, site: &str, err: Error) -> Error {
        if let Some(reporter) = self.error_reporter.as_mut() {
            reporter(site, err);
        } else {
            crate::error::raise_error(site, err);
        }
        err
    }

    fn notify(&self, event: Event) {
        if self.header.has_observer() {
            observer::notify(subject_id(self), event, 0, 0);
        }
    }

    fn bucket_index(&self, key: &[u8]) -> usize {
        hash_bytes(key) as usize % self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.header.count
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Ratio of elements to buckets.
    pub fn load_factor(&self) -> f64 {
        self.header.count as f64 / self.buckets.len() as f64
    }

    pub fn set_destructor(&mut self, destructor: Box<dyn FnMut(&mut V)>) {
        self.destructor = Some(destructor);
    }

    pub fn set_error_function(&mut self, reporter: Box<dyn FnMut(&str, Error)>) {
        self.error_reporter = Some(reporter);
    }

    fn find_in_bucket<'a>(bucket: &'a Option<Box<Entry<V>>>, key: &[u8]) -> Option<&'a Entry<V>> {
        let mut cur = bucket.as_deref();
        while let Some(entry) = cur {
            if entry.key == key {
                return Some(entry);
            }
            cur = entry.next.as_deref();
        }
        None
    }

    fn find_in_bucket_mut<'a>(bucket: &'a mut Option<Box<Entry<V>>>, key: &[u8]) -> Option<&'a mut Entry<V>> {
        let mut cur = bucket.as_deref_mut();
        while let Some(entry) = cur {
            if entry.key == key {
                return Some(entry);
            }
            cur = entry.next.as_deref_mut();
        }
        None
    }

    /// Borrow the value for `key`, if present.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let idx = self.bucket_index(key);
        Self::find_in_bucket(&self.buckets[idx], key).map(|e| &e.value)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite. `Ok(true)` if a new slot was created, `Ok(false)`
    /// if an existing key's value was overwritten in place.
    pub fn add(&mut self, key: &[u8], value: V) -> Result<bool> {
        if self.header.is_read_only() {
            return Err(self.report("Dictionary.Add", Error::ReadOnly));
        }
        let idx = self.bucket_index(key);
        if let Some(entry) = Self::find_in_bucket_mut(&mut self.buckets[idx], key) {
            entry.value = value;
            self.header.touch();
            return Ok(false);
        }
        let entry = Box::new(Entry { key: key.to_vec(), value, next: self.buckets[idx].take() });
        self.buckets[idx] = Some(entry);
        self.header.count += 1;
        self.header.touch();
        self.notify(Event::Add);
        Ok(true)
    }

    /// Insert only if `key` is absent; leaves the dictionary unchanged otherwise.
    pub fn insert(&mut self, key: &[u8], value: V) -> Result<bool> {
        if self.contains_key(key) {
            return Ok(false);
        }
        self.add(key, value)
    }

    /// Overwrite an existing key's value, running the destructor on the
    /// outgoing one. `Err(NotFound)` if `key` is absent.
    pub fn replace(&mut self, key: &[u8], value: V) -> Result<()> {
        if self.header.is_read_only() {
            return Err(self.report("Dictionary.Replace", Error::ReadOnly));
        }
        let idx = self.bucket_index(key);
        if Self::find_in_bucket(&self.buckets[idx], key).is_none() {
            return Err(self.report("Dictionary.Replace", Error::NotFound));
        }
        let entry = Self::find_in_bucket_mut(&mut self.buckets[idx], key).expect("checked above");
        let mut old = core::mem::replace(&mut entry.value, value);
        if let Some(d) = self.destructor.as_mut() {
            d(&mut old);
        }
        self.header.touch();
        self.notify(Event::Replace);
        Ok(())
    }

    /// Remove `key`, running the destructor on its value. `Err(NotFound)` if absent.
    pub fn erase(&mut self, key: &[u8]) -> Result<()> {
        if self.header.is_read_only() {
            return Err(self.report("Dictionary.Erase", Error::ReadOnly));
        }
        let idx = self.bucket_index(key);
        let mut cur = &mut self.buckets[idx];
        let mut removed_value = None;
        loop {
            match cur {
                None => break,
                Some(entry) if entry.key == key => {
                    let mut removed = cur.take().expect("matched Some above");
                    *cur = removed.next.take();
                    removed_value = Some(removed.value);
                    break;
                }
                Some(entry) => {
                    cur = &mut entry.next;
                }
            }
        }
        match removed_value {
            Some(mut value) => {
                if let Some(d) = self.destructor.as_mut() {
                    d(&mut value);
                }
                self.header.count -= 1;
                self.header.touch();
                self.notify(Event::EraseAt);
                Ok(())
            }
            None => Err(self.report("Dictionary.Erase", Error::NotFound)),
        }
    }

    /// Invoke `f` for every `(key, value)` pair.
    pub fn apply(&mut self, mut f: impl FnMut(&[u8], &mut V)) {
        for bucket in &mut self.buckets {
            let mut cur = bucket.as_deref_mut();
            while let Some(entry) = cur {
                f(&entry.key, &mut entry.value);
                cur = entry.next.as_deref_mut();
            }
        }
    }

    /// An iterator over `(key, value)` pairs, bucket order then chain order.
    pub fn iter(&self) -> DictIter<'_, V> {
        DictIter { buckets: &self.buckets, bucket: 0, cur: None }
    }

    /// Build a new dictionary with a larger bucket count and move every
    /// entry into it.
    pub fn rehash_into(&mut self, hint: usize) -> Dictionary<V, GlobalAllocator> {
        let mut out = Dictionary::with_hint(hint);
        for bucket in &mut self.buckets {
            let mut cur = bucket.take();
            while let Some(mut entry) = cur {
                cur = entry.next.take();
                let _ = out.add(&entry.key, entry.value);
            }
        }
        self.header.count = 0;
        self.header.touch();
        out
    }

    /// Write the kind tag, header, and contents as two sub-frames: a
    /// ULEB128-counted collection of length-prefixed keys, then a
    /// ULEB128-counted vector of values encoded with `encode`. Key and
    /// value order match (bucket order, then chain order).
    pub fn save(&self, stream: &mut dyn Stream, mut encode: impl FnMut(&V, &mut dyn Stream) -> Result<()>) -> Result<()> {
        serialize::write_frame(stream, DICTIONARY_TAG, FrameHeader { count: self.header.count as u64, flags: self.header.flags })?;
        serialize::write_uleb128(stream, self.header.count as u64)?;
        for (key, _) in self.iter() {
            serialize::write_bytes_framed(stream, key)?;
        }
        serialize::write_uleb128(stream, self.header.count as u64)?;
        for (_, value) in self.iter() {
            encode(value, stream)?;
        }
        Ok(())
    }
}

impl<V: PartialEq, A: Allocator> Dictionary<V, A> {
    /// Position-sensitive equality: same count, same flags, same bucket
    /// count, and every bucket's chain equal element-wise by key then value.
    pub fn equal(&self, other: &Dictionary<V, A>) -> bool {
        if self.header.count != other.header.count
            || self.header.flags != other.header.flags
            || self.buckets.len() != other.buckets.len()
        {
            return false;
        }
        for (a, b) in self.buckets.iter().zip(other.buckets.iter()) {
            let mut ac = a.as_deref();
            let mut bc = b.as_deref();
            loop {
                match (ac, bc) {
                    (None, None) => break,
                    (Some(ea), Some(eb)) if ea.key == eb.key && ea.value == eb.value => {
                        ac = ea.next.as_deref();
                        bc = eb.next.as_deref();
                    }
                    _ => return false,
                }
            }
        }
        true
    }
}

impl<V, A: Allocator> Container for Dictionary<V, A> {
    fn len(&self) -> usize {
        self.header.count
    }

    fn clear(&mut self) -> Result<()> {
        if self.header.is_read_only() {
            return Err(Error::ReadOnly);
        }
        for bucket in &mut self.buckets {
            let mut cur = bucket.take();
            while let Some(mut entry) = cur {
                cur = entry.next.take();
                if let Some(d) = self.destructor.as_mut() {
                    d(&mut entry.value);
                }
            }
        }
        self.header.count = 0;
        self.header.touch();
        self.notify(Event::Clear);
        Ok(())
    }

    fn container_flags(&self) -> u32 {
        self.header.flags
    }

    fn set_container_flags(&mut self, flags: u32) {
        self.header.flags = flags;
    }
}

impl<V, A: Allocator> Keyed for Dictionary<V, A> {
    type Key = [u8];
    type Value = V;

    fn add(&mut self, key: &[u8], value: V) -> Result<bool> {
        Dictionary::add(self, key, value)
    }

    fn get(&self, key: &[u8]) -> Option<&V> {
        Dictionary::get(self, key)
    }

    fn replace(&mut self, key: &[u8], value: V) -> Result<()> {
        Dictionary::replace(self, key, value)
    }
}

/// An iterator over a [`Dictionary`]'s `(key, value)` pairs.
pub struct DictIter<'a, V> {
    buckets: &'a [Option<Box<Entry<V>>>],
    bucket: usize,
    cur: Option<&'a Entry<V>>,
}

impl<'a, V> Iterator for DictIter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.cur {
                self.cur = entry.next.as_deref();
                return Some((&entry.key, &entry.value));
            }
            if self.bucket >= self.buckets.len() {
                return None;
            }
            self.cur = self.buckets[self.bucket].as_deref();
            self.bucket += 1;
        }
    }
}

impl<V: Clone, A: Allocator> Dictionary<V, A> {
    /// A cursor over this dictionary's `(key, value)` pairs (bucket order,
    /// then chain order), positioned at the first one.
    ///
    /// Holds a raw pointer to the dictionary rather than a borrow, the same
    /// discipline [`crate::list::ListCursor`] uses, so a mutation can run
    /// while a cursor exists — [`Cursor::next`]/[`Cursor::current`] detect
    /// that via the captured timestamp. The caller must not let the cursor
    /// outlive the dictionary. Each visited pair is cloned into the cursor,
    /// so `V: Clone` is required.
    pub fn cursor(&self) -> DictCursor<V, A> {
        let mut c = DictCursor { dict: self as *const _, bucket: 0, cur: None, item: None, index: None, timestamp: self.header.timestamp };
        let _ = Cursor::first(&mut c);
        c
    }
}

/// A cursor over a [`Dictionary`]'s `(key, value)` pairs. See
/// [`Dictionary::cursor`].
pub struct DictCursor<V, A: Allocator> {
    dict: *const Dictionary<V, A>,
    bucket: usize,
    cur: Option<*const Entry<V>>,
    item: Option<(Vec<u8>, V)>,
    index: Option<usize>,
    timestamp: u64,
}

impl<V: Clone, A: Allocator> DictCursor<V, A> {
    fn dict(&self) -> &Dictionary<V, A> {
        // SAFETY: caller contract on `Dictionary::cursor`.
        unsafe { &*self.dict }
    }

    /// Scan forward from `(bucket, cur)`, cloning the first live entry found
    /// into `self.item` (or clearing it at end of the table).
    fn advance_from(&mut self, mut bucket: usize, mut cur: Option<*const Entry<V>>) {
        let dict = self.dict();
        loop {
            if let Some(ptr) = cur {
                // SAFETY: `ptr` was read from a chain in `dict` with no
                // intervening mutation (checked via timestamp by callers).
                let entry = unsafe { &*ptr };
                self.item = Some((entry.key.clone(), entry.value.clone()));
                self.bucket = bucket;
                self.cur = entry.next.as_deref().map(|e| e as *const Entry<V>);
                return;
            }
            if bucket >= dict.buckets.len() {
                self.item = None;
                self.bucket = bucket;
                self.cur = None;
                return;
            }
            cur = dict.buckets[bucket].as_deref().map(|e| e as *const Entry<V>);
            bucket += 1;
        }
    }
}

impl<V: Clone, A: Allocator> Cursor for DictCursor<V, A> {
    type Item = (Vec<u8>, V);

    fn first(&mut self) -> Result<()> {
        self.timestamp = self.dict().header.timestamp;
        self.advance_from(0, None);
        self.index = self.item.as_ref().map(|_| 0);
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        let current_ts = self.dict().header.timestamp;
        iter::check_timestamp(self.timestamp, current_ts)?;
        if self.item.is_none() {
            return Err(Error::NotFound);
        }
        self.advance_from(self.bucket, self.cur);
        self.index = match (self.index, &self.item) {
            (Some(i), Some(_)) => Some(i + 1),
            _ => None,
        };
        if self.item.is_none() {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn current(&self) -> Result<&(Vec<u8>, V)> {
        iter::check_timestamp(self.timestamp, self.dict().header.timestamp)?;
        self.item.as_ref().ok_or(Error::NotFound)
    }

    fn position(&self) -> Option<usize> {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_table_len() {
        assert_eq!(SCATTER.len(), 256);
    }

    #[test]
    fn test_bucket_count_schedule() {
        assert_eq!(bucket_count_for_hint(0), 509);
        assert_eq!(bucket_count_for_hint(1000), 2053);
        assert_eq!(bucket_count_for_hint(1_000_000), 131071);
    }

    #[test]
    fn test_add_and_get() {
        let mut dict: Dictionary<i32> = Dictionary::new();
        assert_eq!(dict.add(b"a", 1).unwrap(), true);
        assert_eq!(dict.add(b"a", 2).unwrap(), false);
        assert_eq!(*dict.get(b"a").unwrap(), 2);
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_insert_does_not_overwrite() {
        let mut dict: Dictionary<i32> = Dictionary::new();
        dict.insert(b"k", 1).unwrap();
        dict.insert(b"k", 2).unwrap();
        assert_eq!(*dict.get(b"k").unwrap(), 1);
    }

    #[test]
    fn test_replace_requires_existing() {
        let mut dict: Dictionary<i32> = Dictionary::new();
        assert_eq!(dict.replace(b"missing", 1), Err(Error::NotFound));
        dict.add(b"k", 1).unwrap();
        dict.replace(b"k", 2).unwrap();
        assert_eq!(*dict.get(b"k").unwrap(), 2);
    }

    #[test]
    fn test_erase() {
        let mut dict: Dictionary<i32> = Dictionary::new();
        dict.add(b"k", 1).unwrap();
        dict.erase(b"k").unwrap();
        assert_eq!(dict.get(b"k"), None);
        assert_eq!(dict.erase(b"k"), Err(Error::NotFound));
    }

    #[test]
    fn test_collisions_chain() {
        // two distinct keys hashing into the same small bucket table
        let mut dict: Dictionary<i32, GlobalAllocator> = Dictionary::with_hint(0);
        for i in 0..50 {
            let key = alloc::format!("key{i}");
            dict.add(key.as_bytes(), i).unwrap();
        }
        assert_eq!(dict.len(), 50);
        for i in 0..50 {
            let key = alloc::format!("key{i}");
            assert_eq!(*dict.get(key.as_bytes()).unwrap(), i);
        }
    }

    #[test]
    fn test_iter_visits_every_entry() {
        let mut dict: Dictionary<i32> = Dictionary::new();
        dict.add(b"a", 1).unwrap();
        dict.add(b"b", 2).unwrap();
        let mut sum = 0;
        for (_, v) in dict.iter() {
            sum += v;
        }
        assert_eq!(sum, 3);
    }

    #[test]
    fn test_apply_mutates_values() {
        let mut dict: Dictionary<i32> = Dictionary::new();
        dict.add(b"a", 1).unwrap();
        dict.add(b"b", 2).unwrap();
        dict.apply(|_, v| *v *= 10);
        assert_eq!(*dict.get(b"a").unwrap(), 10);
        assert_eq!(*dict.get(b"b").unwrap(), 20);
    }

    #[test]
    fn test_equal_is_position_sensitive() {
        let mut a: Dictionary<i32> = Dictionary::new();
        let mut b: Dictionary<i32> = Dictionary::new();
        a.add(b"x", 1).unwrap();
        b.add(b"x", 1).unwrap();
        assert!(a.equal(&b));
        b.add(b"y", 2).unwrap();
        assert!(!a.equal(&b));
    }

    #[test]
    fn test_rehash_into_preserves_entries() {
        let mut dict: Dictionary<i32> = Dictionary::with_hint(0);
        for i in 0..20 {
            let key = alloc::format!("k{i}");
            dict.add(key.as_bytes(), i).unwrap();
        }
        let bigger = dict.rehash_into(100_000);
        assert_eq!(dict.len(), 0);
        assert_eq!(bigger.len(), 20);
        assert_eq!(bigger.bucket_count(), 131071);
    }

    #[test]
    fn test_hash_code_point_varies() {
        assert_ne!(hash_code_point(0x41), hash_code_point(0x42));
        assert_ne!(hash_code_point(0x100), hash_code_point(0x1));
    }

    #[test]
    fn test_save_load_roundtrip() {
        use crate::serialize::MemoryStream;

        let mut dict: Dictionary<i32> = Dictionary::new();
        dict.add(b"a", 1).unwrap();
        dict.add(b"b", 2).unwrap();
        dict.add(b"c", 3).unwrap();

        let mut stream = MemoryStream::new();
        dict.save(&mut stream, |v, s| s.write_all(&v.to_le_bytes())).unwrap();

        let mut reader = MemoryStream::from_bytes(stream.into_inner());
        let loaded = Dictionary::<i32>::load(&mut reader, |s| {
            let mut buf = [0u8; 4];
            s.read_exact(&mut buf)?;
            Ok(i32::from_le_bytes(buf))
        })
        .unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(*loaded.get(b"a").unwrap(), 1);
        assert_eq!(*loaded.get(b"c").unwrap(), 3);
    }

    #[test]
    fn test_load_rejects_wrong_tag() {
        use crate::serialize::{write_frame, FrameHeader, MemoryStream, LIST_TAG};

        let mut stream = MemoryStream::new();
        write_frame(&mut stream, LIST_TAG, FrameHeader { count: 0, flags: 0 }).unwrap();
        let mut reader = MemoryStream::from_bytes(stream.into_inner());
        let result = Dictionary::<i32>::load(&mut reader, |s| {
            let mut b = [0u8; 4];
            s.read_exact(&mut b)?;
            Ok(i32::from_le_bytes(b))
        });
        assert_eq!(result.err(), Some(Error::WrongFile));
    }

    #[test]
    fn test_cursor_visits_every_entry() {
        let mut dict: Dictionary<i32> = Dictionary::new();
        dict.add(b"a", 1).unwrap();
        dict.add(b"b", 2).unwrap();

        let mut cursor = dict.cursor();
        let mut sum = 0;
        loop {
            sum += cursor.current().unwrap().1;
            if cursor.next().is_err() {
                break;
            }
        }
        assert_eq!(sum, 3);
    }

    #[test]
    fn test_cursor_detects_mutation() {
        let mut dict: Dictionary<i32> = Dictionary::new();
        dict.add(b"a", 1).unwrap();
        let cursor = dict.cursor();
        dict.add(b"b", 2).unwrap();
        assert_eq!(cursor.current().err(), Some(Error::ObjectChanged));
    }
}
