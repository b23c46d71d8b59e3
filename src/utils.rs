use std::ffi::CString;
use std::ptr;

use nix::libc;

pub fn into_c_string(s: &str) -> CString {
  CString::new(s).expect("Convert &str to CString should work")
}

/// 以空指针结尾的 C 指针数组，给 exec 用
///
/// 返回值只借用 `strs`，调用方要保证 CString 活得比数组久
pub fn to_c_array(strs: &[CString]) -> Vec<*const libc::c_char> {
  let mut array = strs.iter().map(|s| s.as_ptr()).collect::<Vec<_>>();
  array.push(ptr::null());
  array
}
