//! `clap_istream`/`clap_ostream` implementations backed by in-memory buffers.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::slice;

use clap_sys::stream::{clap_istream, clap_ostream};

struct InputStreamCtx {
    data: *const u8,
    len: usize,
    position: usize,
    max_chunk: usize,
}

/// A `clap_istream` over a borrowed byte slice.
///
/// With [`with_max_chunk`][Self::with_max_chunk] every read returns at most
/// that many bytes, which forces the plug-in to keep reading until the stream
/// is exhausted instead of assuming one read fills its buffer.
pub struct InputStream<'a> {
    raw: Box<clap_istream>,
    _ctx: Box<UnsafeCell<InputStreamCtx>>,
    _data: PhantomData<&'a [u8]>,
}

impl<'a> InputStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_max_chunk(data, usize::MAX)
    }

    pub fn with_max_chunk(data: &'a [u8], max_chunk: usize) -> Self {
        assert!(max_chunk > 0, "the stream chunk size must be at least one byte");

        let ctx = Box::new(UnsafeCell::new(InputStreamCtx {
            data: data.as_ptr(),
            len: data.len(),
            position: 0,
            max_chunk,
        }));
        let raw = Box::new(clap_istream {
            ctx: ctx.get() as *mut c_void,
            read: Some(input_stream_read),
        });

        Self {
            raw,
            _ctx: ctx,
            _data: PhantomData,
        }
    }

    pub fn as_raw(&self) -> *const clap_istream {
        &*self.raw
    }
}

unsafe extern "C" fn input_stream_read(
    stream: *const clap_istream,
    buffer: *mut c_void,
    size: u64,
) -> i64 {
    if stream.is_null() || buffer.is_null() {
        return -1;
    }

    let ctx = &mut *((*stream).ctx as *mut InputStreamCtx);
    let remaining = ctx.len - ctx.position;
    let to_read = (size as usize).min(remaining).min(ctx.max_chunk);
    if to_read == 0 {
        return 0;
    }

    let source = slice::from_raw_parts(ctx.data.add(ctx.position), to_read);
    slice::from_raw_parts_mut(buffer as *mut u8, to_read).copy_from_slice(source);
    ctx.position += to_read;
    to_read as i64
}

/// A `clap_ostream` that appends everything written to it to a `Vec<u8>`.
pub struct OutputStream<'a> {
    raw: Box<clap_ostream>,
    _buffer: PhantomData<&'a mut Vec<u8>>,
}

impl<'a> OutputStream<'a> {
    pub fn new(buffer: &'a mut Vec<u8>) -> Self {
        let raw = Box::new(clap_ostream {
            ctx: buffer as *mut Vec<u8> as *mut c_void,
            write: Some(output_stream_write),
        });

        Self {
            raw,
            _buffer: PhantomData,
        }
    }

    pub fn as_raw(&self) -> *const clap_ostream {
        &*self.raw
    }
}

unsafe extern "C" fn output_stream_write(
    stream: *const clap_ostream,
    buffer: *const c_void,
    size: u64,
) -> i64 {
    if stream.is_null() || buffer.is_null() {
        return -1;
    }

    let sink = &mut *((*stream).ctx as *mut Vec<u8>);
    sink.extend_from_slice(slice::from_raw_parts(buffer as *const u8, size as usize));
    size as i64
}
