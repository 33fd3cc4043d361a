// Hybrid array/hash table — the data structure backing runtime table values,
// used here by the constants deduplication map and by the `getn` property
// tests (§4.6). Ported from `ltable.c`: an append-only array segment for
// small positive-integer keys plus a general hash map, with the array/hash
// split periodically recomputed by `rehash` so that dense integer runs end
// up contiguous in the array part even after out-of-order inserts.
//
// The companion `crates/luars/src/lua_value/lua_table.rs` in the teacher
// crate only ever grows the array part by appending at its tail; it never
// reruns the density heuristic that the real implementation uses to decide
// the array/hash boundary. That simpler design can't reproduce the `#`
// operator's documented quirks (§8, property 6), so this module ports the
// real `numusearray`/`numusehash`/`computesizes`/`rehash` family instead.

use ahash::AHashMap;

use crate::error::{CodegenError, CodegenErrorKind, CodegenResult, SourcePos};
use crate::value::Value;

/// `luaO_log2`: floor(log2(x)) for x >= 1; -1 for x == 0 (matches the
/// sentinel `lobject.c` uses so `ceil_log2` stays a one-liner).
fn floor_log2(x: u32) -> i32 {
    if x == 0 {
        -1
    } else {
        31 - x.leading_zeros() as i32
    }
}

/// `ceillog2`: the bucket index such that 2^(b-1) < x <= 2^b.
fn ceil_log2(x: u32) -> i32 {
    if x <= 1 { 0 } else { floor_log2(x - 1) + 1 }
}

/// Largest `j` the doubling search will probe before giving up on a
/// boundary and falling back to linear scan (§4.6, §8 property 6). Mirrors
/// `ltable.c`'s guard against a sparse table inflating `j` past `INT_MAX`.
const UNBOUND_SEARCH_GUARD: u64 = (i32::MAX as u64) / 2;

#[derive(Default)]
pub struct Table {
    /// Array segment: logical key `i` (1-based) lives at `array[i - 1]`.
    array: Vec<Value>,
    hash: AHashMap<Value, Value>,
}

impl Table {
    pub fn new() -> Self {
        Table {
            array: Vec::new(),
            hash: AHashMap::new(),
        }
    }

    /// `luaH_get`: array part iff the key is a positive integer-valued
    /// double in range, otherwise the hash part (§4.6).
    pub fn get(&self, key: &Value) -> Value {
        if let Some(i) = key.as_array_index() {
            if i >= 1 && (i as usize) <= self.array.len() {
                return self.array[(i - 1) as usize].clone();
            }
        }
        self.hash.get(key).cloned().unwrap_or(Value::Nil)
    }

    fn get_int_present(&self, i: u64) -> bool {
        if i >= 1 && (i as usize) <= self.array.len() {
            !self.array[(i - 1) as usize].is_nil()
        } else {
            !self.get(&Value::number(i as f64)).is_nil()
        }
    }

    /// `luaH_newkey` + `luaH_set`: insert/update/delete a key. Rejects `nil`
    /// and NaN keys (§4.6, §7) the way the VM's `settable` does.
    pub fn raw_set(&mut self, key: Value, value: Value, pos: SourcePos) -> CodegenResult<()> {
        if key.is_nil() {
            return Err(CodegenError::new(
                CodegenErrorKind::IndexIsNil,
                pos,
                "table index is nil",
            ));
        }
        if key.is_nan() {
            return Err(CodegenError::new(
                CodegenErrorKind::IndexIsNaN,
                pos,
                "table index is NaN",
            ));
        }

        if let Some(i) = key.as_array_index() {
            if i >= 1 && (i as usize) <= self.array.len() {
                self.array[(i - 1) as usize] = value;
                return Ok(());
            }
            if i == self.array.len() as u64 + 1 && !value.is_nil() {
                self.array.push(value);
                return Ok(());
            }
        }

        if value.is_nil() {
            self.hash.remove(&key);
            return Ok(());
        }

        if !self.hash.contains_key(&key) {
            self.rehash(&key);
            if let Some(i) = key.as_array_index() {
                if i >= 1 && (i as usize) <= self.array.len() {
                    self.array[(i - 1) as usize] = value;
                    return Ok(());
                }
            }
        }
        self.hash.insert(key, value);
        Ok(())
    }

    pub fn array_len(&self) -> usize {
        self.array.len()
    }

    // `numusearray`: bucket non-nil array entries by `ceillog2` of their
    // 1-based index.
    fn numusearray(&self, nums: &mut Vec<u32>) -> u32 {
        let mut ause = 0;
        for (idx0, v) in self.array.iter().enumerate() {
            if !v.is_nil() {
                let i = (idx0 + 1) as u32;
                let b = ceil_log2(i) as usize;
                if nums.len() <= b {
                    nums.resize(b + 1, 0);
                }
                nums[b] += 1;
                ause += 1;
            }
        }
        ause
    }

    // `numusehash`: same bucketing for hash-part keys that are themselves
    // array-index-eligible, plus a straight count of all used hash slots.
    fn numusehash(&self, nums: &mut Vec<u32>) -> (u32, u32) {
        let mut ause = 0;
        let mut totaluse = 0;
        for (k, v) in self.hash.iter() {
            if v.is_nil() {
                continue;
            }
            totaluse += 1;
            if let Some(i) = k.as_array_index() {
                if i >= 1 && i <= u32::MAX as u64 {
                    let b = ceil_log2(i as u32) as usize;
                    if nums.len() <= b {
                        nums.resize(b + 1, 0);
                    }
                    nums[b] += 1;
                    ause += 1;
                }
            }
        }
        (ause, totaluse)
    }

    // `computesizes`: the optimal array size is the largest power of two
    // for which more than half the slots below it would be occupied.
    fn computesizes(nums: &[u32], narray: u32) -> (u32, u32) {
        let mut a = 0u32;
        let mut na = 0u32;
        let mut n = 0u32;
        let mut twotothei: u64 = 1;
        let mut i = 0usize;
        while twotothei / 2 < narray as u64 {
            if i < nums.len() && nums[i] > 0 {
                a += nums[i];
                if a > (twotothei / 2) as u32 {
                    n = twotothei as u32;
                    na = a;
                }
            }
            i += 1;
            twotothei *= 2;
            if twotothei > (1u64 << 40) {
                break;
            }
        }
        (n, na)
    }

    // `rehash`: recompute the array/hash split accounting for the new key
    // about to be inserted, then migrate every existing entry accordingly.
    fn rehash(&mut self, ek: &Value) {
        let mut nums: Vec<u32> = Vec::new();
        let ausearray = self.numusearray(&mut nums);
        let (ausehash, hashuse) = self.numusehash(&mut nums);
        let mut nasize = ausearray + ausehash;
        let mut totaluse = ausearray + hashuse;

        if let Some(i) = ek.as_array_index() {
            if i >= 1 && i <= u32::MAX as u64 {
                let b = ceil_log2(i as u32) as usize;
                if nums.len() <= b {
                    nums.resize(b + 1, 0);
                }
                nums[b] += 1;
                nasize += 1;
            }
        }
        totaluse += 1; // the about-to-be-inserted key itself

        let (new_array_size, na) = Self::computesizes(&nums, nasize);
        let _hash_hint = totaluse.saturating_sub(na);
        self.resize(new_array_size);
    }

    fn resize(&mut self, new_array_size: u32) {
        let mut ints: Vec<(u64, Value)> = Vec::new();
        let mut others: Vec<(Value, Value)> = Vec::new();

        for (idx0, v) in self.array.drain(..).enumerate() {
            if !v.is_nil() {
                ints.push(((idx0 + 1) as u64, v));
            }
        }
        for (k, v) in self.hash.drain() {
            if v.is_nil() {
                continue;
            }
            match k.as_array_index() {
                Some(i) => ints.push((i, v)),
                None => others.push((k, v)),
            }
        }

        let mut new_array = vec![Value::Nil; new_array_size as usize];
        let mut new_hash = AHashMap::new();
        for (i, v) in ints {
            if i >= 1 && i <= new_array_size as u64 {
                new_array[(i - 1) as usize] = v;
            } else {
                new_hash.insert(Value::number(i as f64), v);
            }
        }
        for (k, v) in others {
            new_hash.insert(k, v);
        }

        self.array = new_array;
        self.hash = new_hash;
    }

    /// `luaH_getn`: the quirky boundary search (§3, §4.6, §8 property 6).
    pub fn len(&self) -> u64 {
        let j = self.array.len() as u64;
        if j > 0 && self.array[(j - 1) as usize].is_nil() {
            return self.array_boundary_search(j);
        }
        if self.hash.is_empty() {
            return j;
        }
        self.unbound_search(j)
    }

    // `luaH_getn`'s array-only binary search: some boundary inside the
    // array part, triggered when the array's last slot is nil.
    fn array_boundary_search(&self, mut j: u64) -> u64 {
        let mut i = 0u64;
        while j - i > 1 {
            let m = (i + j) / 2;
            if self.array[(m - 1) as usize].is_nil() {
                j = m;
            } else {
                i = m;
            }
        }
        i
    }

    // `unbound_search`: doubles `j` until it finds a nil past a non-nil
    // `i`, then binary-searches between them; falls back to a linear scan
    // if doubling would overflow past the 2^31-1 guard.
    fn unbound_search(&self, j0: u64) -> u64 {
        let mut i = j0;
        let mut j = j0 + 1;
        while self.get_int_present(j) {
            i = j;
            if j > UNBOUND_SEARCH_GUARD {
                let mut k = 1u64;
                while self.get_int_present(k) {
                    k += 1;
                }
                return k - 1;
            }
            j *= 2;
        }
        while j - i > 1 {
            let m = (i + j) / 2;
            if self.get_int_present(m) {
                i = m;
            } else {
                j = m;
            }
        }
        i
    }

    /// `luaH_next`: array part in ascending order, then the hash part;
    /// `nil` restarts iteration. Supports resuming from an arbitrary prior
    /// key, as `next()` must.
    pub fn next(&self, key: &Value) -> Option<(Value, Value)> {
        let start_hash_from_beginning = match key {
            Value::Nil => {
                for (idx0, v) in self.array.iter().enumerate() {
                    if !v.is_nil() {
                        return Some((Value::number((idx0 + 1) as f64), v.clone()));
                    }
                }
                true
            }
            _ => {
                if let Some(i) = key.as_array_index() {
                    if i >= 1 && (i as usize) <= self.array.len() {
                        for idx0 in (i as usize)..self.array.len() {
                            if !self.array[idx0].is_nil() {
                                return Some((
                                    Value::number((idx0 + 1) as f64),
                                    self.array[idx0].clone(),
                                ));
                            }
                        }
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
        };

        if start_hash_from_beginning {
            return self.hash.iter().next().map(|(k, v)| (k.clone(), v.clone()));
        }

        let mut seen = false;
        for (k, v) in self.hash.iter() {
            if seen {
                return Some((k.clone(), v.clone()));
            }
            if k == key {
                seen = true;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(x: f64) -> Value {
        Value::number(x)
    }
    fn pos() -> SourcePos {
        SourcePos::new(1)
    }

    #[test]
    fn dense_array_length_ignores_internal_holes() {
        let mut t = Table::new();
        for i in 1..=6 {
            t.raw_set(n(i as f64), n(i as f64), pos()).unwrap();
        }
        assert_eq!(t.len(), 6);
        t.raw_set(n(3.0), Value::Nil, pos()).unwrap();
        assert_eq!(t.len(), 6, "a hole before the last slot doesn't change #t");
        t.raw_set(n(6.0), Value::Nil, pos()).unwrap();
        assert_eq!(t.len(), 2, "nilling the last slot finds an earlier boundary");
    }

    #[test]
    fn sparse_hash_keys_extend_the_boundary_search() {
        let mut t = Table::new();
        for (k, v) in [(1.0, 1.0), (2.0, 2.0), (4.0, 4.0), (5.0, 5.0)] {
            t.raw_set(n(k), n(v), pos()).unwrap();
        }
        assert_eq!(t.len(), 5);
        t.raw_set(n(10.0), n(10.0), pos()).unwrap();
        assert_eq!(t.len(), 10);
        t.raw_set(n(20.0), n(20.0), pos()).unwrap();
        assert_eq!(t.len(), 20);
    }

    #[test]
    fn malicious_sparse_growth_falls_back_to_linear_search() {
        let mut t = Table::new();
        for (k, v) in [(1.0, 1.0), (2.0, 2.0), (4.0, 4.0), (5.0, 5.0)] {
            t.raw_set(n(k), n(v), pos()).unwrap();
        }
        let mut k = 10u64;
        while k < (1u64 << 31) {
            t.raw_set(n(k as f64), n(k as f64), pos()).unwrap();
            k *= 2;
        }
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn nil_and_nan_keys_are_rejected() {
        let mut t = Table::new();
        assert_eq!(
            t.raw_set(Value::Nil, n(1.0), pos()).unwrap_err().kind,
            CodegenErrorKind::IndexIsNil
        );
        assert_eq!(
            t.raw_set(n(f64::NAN), n(1.0), pos()).unwrap_err().kind,
            CodegenErrorKind::IndexIsNaN
        );
    }

    #[test]
    fn next_walks_array_then_hash() {
        let mut t = Table::new();
        t.raw_set(n(1.0), n(10.0), pos()).unwrap();
        t.raw_set(n(2.0), n(20.0), pos()).unwrap();
        let (k, v) = t.next(&Value::Nil).unwrap();
        assert_eq!(k, n(1.0));
        assert_eq!(v, n(10.0));
        let (k2, v2) = t.next(&k).unwrap();
        assert_eq!(k2, n(2.0));
        assert_eq!(v2, n(20.0));
    }
}
