use core_foundation::array::CFArray;
use core_foundation::base::{CFGetTypeID, FromVoid, ItemRef, TCFType, ToVoid};
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_graphics::geometry::CGRect;

/// One entry of a window-info list. Keys are often missing (untitled windows, for one), so every
/// getter is optional.
#[derive(Debug)]
pub struct WindowInfoDict {
    dictionary: CFDictionary,
}

impl WindowInfoDict {
    pub fn new(dictionary: CFDictionary) -> Self {
        Self { dictionary }
    }

    /// Wraps each dictionary in `list`; anything else is skipped.
    pub fn all(list: &CFArray) -> Vec<Self> {
        list.iter()
            .filter_map(|item| {
                let ptr = *item;
                let is_dictionary = !ptr.is_null()
                    && unsafe { CFGetTypeID(ptr) } == <CFDictionary as TCFType>::type_id();
                if !is_dictionary {
                    return None;
                }
                let dictionary: CFDictionary =
                    unsafe { TCFType::wrap_under_get_rule(ptr as CFDictionaryRef) };
                Some(Self::new(dictionary))
            })
            .collect()
    }

    fn get<T: FromVoid>(&self, key: CFString) -> Option<ItemRef<'_, T>> {
        let value = self.dictionary.find(key.to_void())?;
        Some(unsafe { T::from_void(*value) })
    }

    pub fn get_i64(&self, key: CFString) -> Option<i64> {
        self.get::<CFNumber>(key)?.to_i64()
    }

    pub fn get_string(&self, key: CFString) -> Option<String> {
        self.get::<CFString>(key).map(|s| s.to_string())
    }

    pub fn get_rect(&self, key: CFString) -> Option<CGRect> {
        let rect = self.get::<CFDictionary>(key)?;
        CGRect::from_dict_representation(&rect)
    }
}
