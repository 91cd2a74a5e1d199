use vfs::Error;

use crate::{FCT_CACHE_SIZE, Result, SuperBlock, Volume};

impl Volume {
    /// 补充头缓存
    ///
    /// FCT 链为空时直接从尾缓存转移；否则从头引用簇读出引用，
    /// 读尽的引用簇先从链上摘下，再作为普通空闲簇放入头缓存。
    pub fn replenish(&mut self) -> Result<()> {
        log::debug!("replenish()");
        let mut sb = self.sb.get()?.clone();
        if !sb.chead.is_empty() {
            return Ok(());
        }
        sb.chead.in_idx = 0;
        sb.chead.out_idx = 0;
        let rpc = sb.refs_per_cluster();

        let mut filled = 0;
        while !sb.chead.is_full() {
            if sb.crefs == 0 {
                while !sb.chead.is_full() {
                    let Some(c) = sb.ctail.pop() else {
                        break;
                    };
                    sb.chead.push(c);
                }
                break;
            }

            let Some(head) = sb.chead.cluster else {
                log::error!("FCT chain has {} clusters but no head", sb.crefs);
                return Err(Error::InvalidFormat);
            };
            let shared = sb.ctail.cluster == Some(head);
            // 与尾引用簇共用时，只能读到尾部已写入的位置
            let limit = if shared { sb.ctail.cluster_idx } else { rpc - 1 };

            // 留一个空位给读尽后摘下的引用簇
            let mut refs = self.read_refs(head)?;
            while filled + 1 < FCT_CACHE_SIZE && sb.chead.cluster_idx < limit {
                if let Some(c) = refs[sb.chead.cluster_idx].take() {
                    sb.chead.push(c);
                    filled += 1;
                }
                sb.chead.cluster_idx += 1;
            }

            if sb.chead.cluster_idx < limit {
                self.write_refs(head, &refs)?;
                break;
            }

            // 读尽，摘下
            sb.crefs -= 1;
            sb.chead.cluster_idx = 0;
            if sb.crefs == 0 {
                sb.chead.cluster = None;
                sb.ctail.cluster = None;
                sb.ctail.cluster_idx = 0;
            } else {
                sb.chead.cluster = refs[rpc - 1];
            }
            sb.chead.push(head);
            filled += 1;
            sb.cfree += 1;
        }

        self.commit(sb)
    }

    /// 清空尾缓存
    ///
    /// FCT 链为空且头缓存有空位时直接转移到头缓存；
    /// 否则追加到尾引用簇，写满时取尾缓存中下一个簇作为新的尾引用簇。
    pub fn deplete(&mut self) -> Result<()> {
        log::debug!("deplete()");
        let mut sb = self.sb.get()?.clone();
        if sb.ctail.is_empty() {
            return Ok(());
        }

        if sb.crefs == 0 {
            while !sb.chead.is_full() {
                let Some(c) = sb.ctail.pop() else {
                    break;
                };
                sb.chead.push(c);
            }
            if sb.ctail.is_empty() {
                return self.commit(sb);
            }
            self.start_chain(&mut sb)?;
        }

        let rpc = sb.refs_per_cluster();
        let Some(mut tail) = sb.ctail.cluster else {
            log::error!("FCT chain has {} clusters but no tail", sb.crefs);
            return Err(Error::InvalidFormat);
        };
        let mut refs = self.read_refs(tail)?;
        while let Some(c) = sb.ctail.pop() {
            if sb.ctail.cluster_idx == rpc - 1 {
                // 尾引用簇已满，`c` 成为新的尾引用簇
                sb.cfree -= 1;
                sb.crefs += 1;
                refs[rpc - 1] = Some(c);
                self.write_refs(tail, &refs)?;
                tail = c;
                refs = vec![None; rpc];
                sb.ctail.cluster = Some(c);
                sb.ctail.cluster_idx = 0;
                continue;
            }
            refs[sb.ctail.cluster_idx] = Some(c);
            sb.ctail.cluster_idx += 1;
        }
        self.write_refs(tail, &refs)?;
        sb.ctail.in_idx = 0;
        sb.ctail.out_idx = 0;

        self.commit(sb)
    }

    /// 用尾缓存中下一个簇建立只有一个引用簇的 FCT 链
    fn start_chain(&self, sb: &mut SuperBlock) -> Result<()> {
        let Some(c) = sb.ctail.pop() else {
            return Ok(());
        };
        sb.cfree -= 1;
        sb.crefs = 1;
        sb.chead.cluster = Some(c);
        sb.chead.cluster_idx = 0;
        sb.ctail.cluster = Some(c);
        sb.ctail.cluster_idx = 0;
        self.write_refs(c, &vec![None; sb.refs_per_cluster()])
    }
}
