//! CoreFoundation value conversion.
//!
//! Decodes CF values handed back by native property queries into the
//! crate's [`PropertyValue`] vocabulary. All functions borrow their input;
//! ownership and release stay with the caller.

use std::ffi::{CStr, c_char, c_void};

use core_foundation_sys::base::{Boolean, CFGetTypeID, CFIndex, CFTypeRef, kCFAllocatorDefault};
use core_foundation_sys::dictionary::{
    CFDictionaryGetCount, CFDictionaryGetKeysAndValues, CFDictionaryGetTypeID, CFDictionaryRef,
};
use core_foundation_sys::number::{
    CFBooleanGetTypeID, CFBooleanGetValue, CFBooleanRef, CFNumberGetTypeID, CFNumberGetValue,
    CFNumberRef, kCFNumberSInt64Type,
};
use core_foundation_sys::string::{
    CFStringCreateWithBytes, CFStringGetCString, CFStringGetCStringPtr, CFStringGetLength,
    CFStringGetMaximumSizeForEncoding, CFStringGetTypeID, CFStringRef, kCFStringEncodingUTF8,
};

use crate::types::{PropertyBag, PropertyValue};

/// Create an owned CFString for handing to native calls. The caller
/// releases it. Null on allocation failure.
pub(crate) unsafe fn cf_string(value: &str) -> CFStringRef {
    unsafe {
        CFStringCreateWithBytes(
            kCFAllocatorDefault,
            value.as_ptr(),
            value.len() as CFIndex,
            kCFStringEncodingUTF8,
            false as Boolean,
        )
    }
}

/// Copy a CFString's contents out as a Rust string.
pub(crate) unsafe fn string_from_cf(value: CFStringRef) -> Option<String> {
    if value.is_null() {
        return None;
    }
    unsafe {
        // Fast path: the string may already be stored as UTF-8
        let direct = CFStringGetCStringPtr(value, kCFStringEncodingUTF8);
        if !direct.is_null() {
            return Some(CStr::from_ptr(direct).to_string_lossy().into_owned());
        }

        let length = CFStringGetLength(value);
        let capacity = CFStringGetMaximumSizeForEncoding(length, kCFStringEncodingUTF8) + 1;
        let mut buffer = vec![0u8; capacity as usize];
        if CFStringGetCString(
            value,
            buffer.as_mut_ptr() as *mut c_char,
            capacity,
            kCFStringEncodingUTF8,
        ) == 0
        {
            return None;
        }

        let nul = buffer.iter().position(|&byte| byte == 0).unwrap_or(buffer.len());
        buffer.truncate(nul);
        String::from_utf8(buffer).ok()
    }
}

/// Decode a CF value into a [`PropertyValue`].
///
/// Strings, booleans, integers, and dictionaries map directly; any other
/// CF type decodes to `None` and the field degrades individually.
pub(crate) unsafe fn decode(value: CFTypeRef) -> Option<PropertyValue> {
    if value.is_null() {
        return None;
    }
    unsafe {
        let type_id = CFGetTypeID(value);

        if type_id == CFStringGetTypeID() {
            return string_from_cf(value as CFStringRef).map(PropertyValue::String);
        }
        if type_id == CFBooleanGetTypeID() {
            return Some(PropertyValue::Boolean(CFBooleanGetValue(value as CFBooleanRef) != 0));
        }
        if type_id == CFNumberGetTypeID() {
            let mut out: i64 = 0;
            let converted = CFNumberGetValue(
                value as CFNumberRef,
                kCFNumberSInt64Type,
                &mut out as *mut i64 as *mut c_void,
            );
            return (converted != 0).then_some(PropertyValue::Integer(out));
        }
        if type_id == CFDictionaryGetTypeID() {
            return dictionary_from_cf(value as CFDictionaryRef).map(PropertyValue::Dictionary);
        }

        None
    }
}

unsafe fn dictionary_from_cf(dict: CFDictionaryRef) -> Option<PropertyBag> {
    unsafe {
        let count = CFDictionaryGetCount(dict);
        if count < 0 {
            return None;
        }
        let count = count as usize;

        let mut keys: Vec<*const c_void> = vec![std::ptr::null(); count];
        let mut values: Vec<*const c_void> = vec![std::ptr::null(); count];
        CFDictionaryGetKeysAndValues(dict, keys.as_mut_ptr(), values.as_mut_ptr());

        let mut bag = PropertyBag::with_capacity(count);
        for (key, value) in keys.into_iter().zip(values) {
            // Non-string keys and unsupported value types are skipped
            if CFGetTypeID(key as CFTypeRef) != CFStringGetTypeID() {
                continue;
            }
            let Some(key) = string_from_cf(key as CFStringRef) else {
                continue;
            };
            if let Some(decoded) = decode(value as CFTypeRef) {
                bag.insert(key, decoded);
            }
        }
        Some(bag)
    }
}
