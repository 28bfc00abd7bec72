//! Command dispatch.
//!
//! Takes a parsed argument vector, runs it against the store, and appends
//! exactly one TLV value to the response buffer. Command-level problems
//! (unknown command, wrong arity, type mismatch, unparsable number) are
//! answered with an error value; they never close the connection and
//! never unwind into the caller.

use bytes::{Bytes, BytesMut};

use crate::protocol::Value;
use crate::storage::{Dict, Object, ZSet};

/// Execute `argv` and append the reply to `out`.
pub fn dispatch(dict: &mut Dict, argv: &[Bytes], out: &mut BytesMut) {
    match argv {
        [cmd, key] if cmd.as_ref() == b"get" => get(dict, key, out),
        [cmd, key, val] if cmd.as_ref() == b"set" => set(dict, key, val, out),
        [cmd, key] if cmd.as_ref() == b"del" => del(dict, key, out),
        [cmd] if cmd.as_ref() == b"keys" => keys(dict, out),
        [cmd, key, score, name] if cmd.as_ref() == b"zadd" => zadd(dict, key, score, name, out),
        [cmd, key, name] if cmd.as_ref() == b"zrem" => zrem(dict, key, name, out),
        [cmd, key, name] if cmd.as_ref() == b"zscore" => zscore(dict, key, name, out),
        [cmd, key, score, name, offset, limit] if cmd.as_ref() == b"zquery" => {
            zquery(dict, key, score, name, offset, limit, out)
        }
        _ => Value::err("ERR bad command").encode(out),
    }
}

fn get(dict: &mut Dict, key: &Bytes, out: &mut BytesMut) {
    let reply = match dict.find(key) {
        None => Value::Nil,
        Some(id) => match dict.value(id) {
            Object::Str(v) => Value::Str(v.clone()),
            Object::Zset(_) => Value::err("ERR not a string value"),
        },
    };
    reply.encode(out);
}

fn set(dict: &mut Dict, key: &Bytes, val: &Bytes, out: &mut BytesMut) {
    match dict.find(key) {
        Some(id) => match dict.value_mut(id) {
            Object::Str(v) => *v = val.clone(),
            Object::Zset(_) => {
                return Value::err("ERR not a string value").encode(out);
            }
        },
        None => {
            dict.insert(key.clone(), Object::Str(val.clone()));
        }
    }
    Value::Nil.encode(out);
}

fn del(dict: &mut Dict, key: &Bytes, out: &mut BytesMut) {
    let removed = dict.remove(key);
    Value::Int(i64::from(removed)).encode(out);
}

/// Snapshot of every key at call time, live table first.
fn keys(dict: &mut Dict, out: &mut BytesMut) {
    let mut items = Vec::with_capacity(dict.len());
    dict.for_each_key(|k| items.push(Value::Str(k.clone())));
    Value::Arr(items).encode(out);
}

/// Find the ordered set at `key`, or `None` if the key is absent.
/// A key holding a plain string is a type error, reported inline.
fn expect_zset<'a>(
    dict: &'a mut Dict,
    key: &Bytes,
    out: &mut BytesMut,
) -> Result<Option<&'a mut ZSet>, ()> {
    match dict.find(key) {
        None => Ok(None),
        Some(id) => match dict.value_mut(id) {
            Object::Zset(zs) => Ok(Some(zs)),
            Object::Str(_) => {
                Value::err("ERR not a zset value").encode(out);
                Err(())
            }
        },
    }
}

fn zadd(dict: &mut Dict, key: &Bytes, score: &Bytes, name: &Bytes, out: &mut BytesMut) {
    let Some(score) = parse_score(score) else {
        return Value::err("ERR expect number").encode(out);
    };
    let id = match dict.find(key) {
        Some(id) => id,
        None => dict.insert(key.clone(), Object::Zset(Box::new(ZSet::new()))),
    };
    let added = match dict.value_mut(id) {
        Object::Zset(zs) => zs.insert(name, score),
        Object::Str(_) => {
            return Value::err("ERR not a zset value").encode(out);
        }
    };
    Value::Int(i64::from(added)).encode(out);
}

fn zrem(dict: &mut Dict, key: &Bytes, name: &Bytes, out: &mut BytesMut) {
    let reply = match expect_zset(dict, key, out) {
        Err(()) => return,
        Ok(None) => Value::Int(0),
        Ok(Some(zs)) => Value::Int(i64::from(zs.remove(name))),
    };
    reply.encode(out);
}

fn zscore(dict: &mut Dict, key: &Bytes, name: &Bytes, out: &mut BytesMut) {
    let reply = match expect_zset(dict, key, out) {
        Err(()) => return,
        Ok(None) => Value::Nil,
        Ok(Some(zs)) => match zs.lookup(name) {
            Some(id) => Value::Dbl(zs.node(id).score()),
            None => Value::Nil,
        },
    };
    reply.encode(out);
}

/// `zquery key score name offset limit`: seek the smallest member ≥
/// (score, name), shift by `offset` positions, then emit up to `limit`
/// (name, score) pairs in order as a flat array.
fn zquery(
    dict: &mut Dict,
    key: &Bytes,
    score: &Bytes,
    name: &Bytes,
    offset: &Bytes,
    limit: &Bytes,
    out: &mut BytesMut,
) {
    let Some(score) = parse_score(score) else {
        return Value::err("ERR expect number").encode(out);
    };
    let (Some(offset), Some(limit)) = (parse_int(offset), parse_int(limit)) else {
        return Value::err("ERR expect int").encode(out);
    };
    let zs = match expect_zset(dict, key, out) {
        Err(()) => return,
        Ok(None) => {
            return Value::Arr(Vec::new()).encode(out);
        }
        Ok(Some(zs)) => zs,
    };

    let mut items = Vec::new();
    if limit > 0 {
        let mut cur = zs.seek_ge(score, name).and_then(|id| zs.offset(id, offset));
        while let Some(id) = cur {
            if items.len() as i64 >= limit.saturating_mul(2) {
                break;
            }
            let node = zs.node(id);
            items.push(Value::Str(node.name().clone()));
            items.push(Value::Dbl(node.score()));
            cur = zs.offset(id, 1);
        }
    }
    Value::Arr(items).encode(out);
}

/// Scores are doubles; NaN is not a usable sort key and is rejected.
fn parse_score(data: &Bytes) -> Option<f64> {
    let s = std::str::from_utf8(data).ok()?;
    s.parse::<f64>().ok().filter(|v| !v.is_nan())
}

fn parse_int(data: &Bytes) -> Option<i64> {
    std::str::from_utf8(data).ok()?.parse().ok()
}
