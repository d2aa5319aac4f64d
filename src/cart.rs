//! Shopping cart whose only storage is the client's cookie jar.
//!
//! Slot `N` is the cookie `item<N>`. Occupied slots always form the prefix
//! `item1..itemK`: a cart is read from the cookies up to the first missing
//! slot, and every operation emits the `Set-Cookie` headers that keep the
//! prefix gapless on the client.
//!
//! Operations are pure. They take the cart as the request presented it and
//! return the new cart together with the cookie mutations that produce it;
//! nothing is remembered between requests.
//!
//! # Examples
//! ```
//! use cookie_cart::cart::Cart;
//!
//! let cart = Cart::from_cookies(Some(&b"username=bob; item1=tea; item2=jam"[..]), 12);
//! assert_eq!(cart.list(None, None), "1. tea\n2. jam\n");
//!
//! let update = cart.remove(1).unwrap();
//! assert_eq!(update.cart.list(None, None), "1. jam\n");
//! assert_eq!(update.cookies.len(), 2);
//! ```

use crate::http::{
    pairs::{self, Separator},
    response::SetCookie,
};
use std::{error, fmt};

/// Default number of slots.
pub const MAX_SLOTS: usize = 12;

/// `max-age` of an item cookie: one day.
pub const ITEM_TTL: i64 = 24 * 60 * 60;

#[inline]
fn slot_name(slot: usize) -> String {
    format!("item{slot}")
}

/// The slot number given to [`Cart::remove`] is not between 1 and the
/// number of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSuchSlot(pub usize);

impl error::Error for NoSuchSlot {}
impl fmt::Display for NoSuchSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no item in slot {}", self.0)
    }
}

/// Cart contents after an operation, plus the cookies that bring the
/// client's jar to that state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub cart: Cart,
    pub cookies: Vec<SetCookie>,
}

/// View of the items held in `item1..item<max_slots>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    items: Vec<String>,
    max_slots: usize,
}

impl Cart {
    #[inline]
    pub fn new(max_slots: usize) -> Self {
        Cart {
            items: Vec::new(),
            max_slots,
        }
    }

    /// Reads slots from a raw `Cookie` header, stopping at the first missing
    /// or empty one.
    pub fn from_cookies(cookies: Option<&[u8]>, max_slots: usize) -> Self {
        let items = (1..=max_slots)
            .map_while(|slot| {
                pairs::get(cookies, &slot_name(slot), Separator::Cookie)
                    .filter(|item| !item.is_empty())
            })
            .collect();

        Cart { items, max_slots }
    }

    #[inline(always)]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline(always)]
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Lowest unoccupied slot, or `None` when the cart is full.
    #[inline]
    pub fn free_slot(&self) -> Option<usize> {
        (self.items.len() < self.max_slots).then_some(self.items.len() + 1)
    }

    /// Numbered listing, one `"<n>. <item>\n"` line per item.
    ///
    /// `delete_slot` drops that item and renumbers the rest; `pending_insert`
    /// is listed after the last remaining item.
    pub fn list(&self, pending_insert: Option<&str>, delete_slot: Option<usize>) -> String {
        let kept = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| delete_slot != Some(i + 1))
            .map(|(_, item)| item.as_str());

        kept.chain(pending_insert)
            .enumerate()
            .map(|(i, item)| format!("{}. {item}\n", i + 1))
            .collect()
    }

    /// Puts `item` into the lowest free slot, or returns `None` when the
    /// cart is full.
    pub fn add(&self, item: &str) -> Option<Update> {
        let slot = self.free_slot()?;

        let mut cart = self.clone();
        cart.items.push(item.to_owned());

        Some(Update {
            cart,
            cookies: vec![SetCookie::new(slot_name(slot), item, ITEM_TTL)],
        })
    }

    /// Removes the item in `slot` (1-based), shifting later items down by one.
    ///
    /// Every shifted item is re-issued under its new slot and the slot that
    /// was highest before is expired.
    pub fn remove(&self, slot: usize) -> Result<Update, NoSuchSlot> {
        let len = self.items.len();
        if slot == 0 || slot > len {
            return Err(NoSuchSlot(slot));
        }

        let mut cookies: Vec<SetCookie> = (slot..len)
            .map(|to| SetCookie::new(slot_name(to), self.items[to].as_str(), ITEM_TTL))
            .collect();
        cookies.push(SetCookie::expire(slot_name(len)));

        let mut cart = self.clone();
        cart.items.remove(slot - 1);

        Ok(Update { cart, cookies })
    }

    /// Empties the cart. Returns the listing of what was bought along with
    /// one expiring cookie per occupied slot.
    pub fn checkout(&self) -> (String, Update) {
        let listing = self.list(None, None);
        let cookies = (1..=self.items.len())
            .map(|slot| SetCookie::expire(slot_name(slot)))
            .collect();

        let update = Update {
            cart: Cart::new(self.max_slots),
            cookies,
        };
        (listing, update)
    }
}
