use core::ffi::CStr;

/// The name of the symbol containing `addr`, as far as the dynamic linker
/// knows. Only exported symbols are found this way.
pub fn symbol_name(addr: usize) -> Option<&'static CStr> {
    unsafe {
        let mut info: libc::Dl_info = core::mem::zeroed();

        if libc::dladdr(addr as _, &mut info) == 0 {
            trace!("dladdr knows nothing about {addr:#x}");
            return None;
        }

        if !info.dli_sname.is_null() {
            // SAFETY: dladdr returns strings owned by the loaded object, which
            // we never unload.
            let sym_name = CStr::from_ptr(info.dli_sname);
            return Some(sym_name);
        }

        None
    }
}
